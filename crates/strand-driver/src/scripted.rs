//! Scripted driver for tests: replays queued responses and counts calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{ConsoleEntry, Driver, ElementInfo, NetworkEntry, Screenshot};
use strand_core::StrandError;

#[derive(Default)]
struct ScriptedState {
    eval_queue: VecDeque<strand_core::Result<Value>>,
    elements: HashMap<String, Vec<ElementInfo>>,
    network: Vec<NetworkEntry>,
    console: Vec<ConsoleEntry>,
    current_url: String,
    calls: Vec<String>,
    fail_navigation: bool,
}

/// A [`Driver`] double with canned behavior.
#[derive(Default)]
pub struct ScriptedDriver {
    state: Mutex<ScriptedState>,
    connected: AtomicBool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver.connected.store(true, Ordering::SeqCst);
        driver
    }

    /// Queue the result of the next `evaluate`/`evaluate_async` call.
    pub fn push_eval(&self, result: strand_core::Result<Value>) {
        self.state.lock().eval_queue.push_back(result);
    }

    pub fn set_elements(&self, selector: &str, elements: Vec<ElementInfo>) {
        self.state.lock().elements.insert(selector.into(), elements);
    }

    pub fn set_network(&self, entries: Vec<NetworkEntry>) {
        self.state.lock().network = entries;
    }

    pub fn set_console(&self, entries: Vec<ConsoleEntry>) {
        self.state.lock().console = entries;
    }

    pub fn set_fail_navigation(&self, fail: bool) {
        self.state.lock().fail_navigation = fail;
    }

    /// Every call made so far, by method name (navigate calls include the URL).
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn log_call(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }

    fn check_connected(&self) -> strand_core::Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StrandError::SessionDisconnected("scripted driver closed".into()))
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> strand_core::Result<()> {
        self.check_connected()?;
        self.log_call(format!("navigate:{url}"));
        let mut state = self.state.lock();
        if state.fail_navigation {
            return Err(StrandError::Driver {
                action: "navigate".into(),
                reason: "scripted navigation failure".into(),
            });
        }
        state.current_url = url.to_string();
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> strand_core::Result<Value> {
        self.check_connected()?;
        self.log_call("evaluate");
        self.state
            .lock()
            .eval_queue
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }

    async fn evaluate_async(&self, _script: &str) -> strand_core::Result<Value> {
        self.check_connected()?;
        self.log_call("evaluate_async");
        self.state
            .lock()
            .eval_queue
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }

    async fn find_elements(&self, selector: &str) -> strand_core::Result<Vec<ElementInfo>> {
        self.check_connected()?;
        self.log_call(format!("find_elements:{selector}"));
        Ok(self
            .state
            .lock()
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn screenshot(&self) -> strand_core::Result<Screenshot> {
        self.check_connected()?;
        self.log_call("screenshot");
        Ok(Screenshot {
            data_base64: String::new(),
        })
    }

    async fn console_log(&self) -> strand_core::Result<Vec<ConsoleEntry>> {
        self.check_connected()?;
        self.log_call("console_log");
        Ok(self.state.lock().console.clone())
    }

    async fn network_log(&self) -> strand_core::Result<Vec<NetworkEntry>> {
        self.check_connected()?;
        self.log_call("network_log");
        Ok(self.state.lock().network.clone())
    }

    async fn current_url(&self) -> strand_core::Result<String> {
        self.check_connected()?;
        Ok(self.state.lock().current_url.clone())
    }

    async fn close(&self) -> strand_core::Result<()> {
        self.log_call("close");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_eval_queue_and_counts() {
        let driver = ScriptedDriver::new();
        driver.push_eval(Ok(serde_json::json!("first")));
        driver.push_eval(Ok(serde_json::json!("second")));

        assert_eq!(driver.evaluate("x").await.unwrap(), "first");
        assert_eq!(driver.evaluate("y").await.unwrap(), "second");
        // Queue exhausted falls back to null
        assert!(driver.evaluate("z").await.unwrap().is_null());
        assert_eq!(driver.call_count("evaluate"), 3);
    }

    #[tokio::test]
    async fn test_screenshot_decodes_to_bytes() {
        let driver = ScriptedDriver::new();
        let mut shot = driver.screenshot().await.unwrap();
        assert!(shot.decode().unwrap().is_empty());

        shot.data_base64 = "aGVsbG8=".to_string();
        assert_eq!(shot.decode().unwrap(), b"hello");
        shot.data_base64 = "not base64!".to_string();
        assert!(shot.decode().is_err());
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_calls() {
        let driver = ScriptedDriver::new();
        driver.close().await.unwrap();
        assert!(!driver.is_connected());
        assert!(matches!(
            driver.evaluate("x").await,
            Err(StrandError::SessionDisconnected(_))
        ));
    }
}
