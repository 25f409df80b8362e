//! Chrome DevTools Protocol driver.
//!
//! Talks to a locally running Chrome/Chromium over the `/json` HTTP
//! endpoints and sends CDP commands over the per-tab WebSocket debugger URL.
//! The capture hook installed after each navigation records console lines and
//! fetch/XHR responses into page-global buffers so `console_log` and
//! `network_log` can read them back without event subscriptions.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{ConsoleEntry, Driver, ElementInfo, NetworkEntry, Screenshot};
use strand_core::StrandError;

/// Installed once per navigation. Wraps console methods and fetch/XHR so the
/// page records its own traffic; bodies are capped to keep reads bounded.
const CAPTURE_HOOK: &str = r#"
(function() {
  if (window.__strandHooked) return true;
  window.__strandHooked = true;
  window.__strandConsole = [];
  window.__strandNetwork = [];
  const CAP = 65536;
  for (const level of ['log', 'info', 'warn', 'error']) {
    const orig = console[level].bind(console);
    console[level] = (...args) => {
      try {
        window.__strandConsole.push({ level, text: args.map(String).join(' ').slice(0, 2048) });
      } catch (e) {}
      orig(...args);
    };
  }
  const origFetch = window.fetch;
  window.fetch = async (...args) => {
    const resp = await origFetch(...args);
    try {
      const clone = resp.clone();
      const body = await clone.text();
      window.__strandNetwork.push({ url: resp.url, status: resp.status, body: body.slice(0, CAP) });
    } catch (e) {
      window.__strandNetwork.push({ url: String(args[0]), status: resp.status, body: null });
    }
    return resp;
  };
  const origOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function(method, url, ...rest) {
    this.addEventListener('loadend', () => {
      try {
        window.__strandNetwork.push({
          url: String(url),
          status: this.status,
          body: typeof this.responseText === 'string' ? this.responseText.slice(0, CAP) : null,
        });
      } catch (e) {}
    });
    return origOpen.call(this, method, url, ...rest);
  };
  return true;
})()
"#;

fn driver_err(action: &str, reason: impl std::fmt::Display) -> StrandError {
    StrandError::Driver {
        action: action.into(),
        reason: reason.to_string(),
    }
}

struct TabHandle {
    id: String,
    ws_url: String,
}

/// CDP-backed [`Driver`] owning one tab for the life of the session.
pub struct CdpDriver {
    base_url: String,
    http: reqwest::Client,
    tab: Mutex<Option<TabHandle>>,
    next_id: AtomicI64,
    connected: AtomicBool,
    nav_timeout: Duration,
}

impl CdpDriver {
    /// Connect to a Chrome instance on localhost and open a fresh tab.
    pub async fn connect(port: u16, nav_timeout: Duration) -> strand_core::Result<Self> {
        let driver = Self {
            base_url: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::new(),
            tab: Mutex::new(None),
            next_id: AtomicI64::new(1),
            connected: AtomicBool::new(false),
            nav_timeout,
        };

        let url = format!("{}/json/new?about:blank", driver.base_url);
        let resp: Value = driver
            .http
            .put(&url)
            .send()
            .await
            .map_err(|e| StrandError::SessionDisconnected(format!("CDP new tab failed: {e}")))?
            .json()
            .await
            .map_err(|e| StrandError::SessionDisconnected(format!("CDP parse new tab: {e}")))?;

        let id = resp["id"].as_str().unwrap_or_default().to_string();
        let ws_url = resp["webSocketDebuggerUrl"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if id.is_empty() || ws_url.is_empty() {
            return Err(StrandError::SessionDisconnected(
                "CDP new tab returned no debugger URL".into(),
            ));
        }

        info!(tab = %id, "CDP session opened");
        *driver.tab.lock() = Some(TabHandle { id, ws_url });
        driver.connected.store(true, Ordering::SeqCst);
        Ok(driver)
    }

    fn ws_url(&self) -> strand_core::Result<String> {
        self.tab
            .lock()
            .as_ref()
            .map(|t| t.ws_url.clone())
            .ok_or_else(|| StrandError::SessionDisconnected("no open tab".into()))
    }

    /// Send one CDP command and wait for its response frame.
    async fn send_command(&self, method: &str, params: Value) -> strand_core::Result<Value> {
        if !self.is_connected() {
            return Err(StrandError::SessionDisconnected("driver closed".into()));
        }
        let ws_url = self.ws_url()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({ "id": id, "method": method, "params": params });

        let (mut ws, _) = connect_async(&ws_url).await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            StrandError::SessionDisconnected(format!("WebSocket connect failed: {e}"))
        })?;

        ws.send(Message::Text(msg.to_string().into()))
            .await
            .map_err(|e| {
                self.connected.store(false, Ordering::SeqCst);
                StrandError::SessionDisconnected(format!("WebSocket send failed: {e}"))
            })?;

        // Skip event frames until the matching response id arrives.
        let recv = async {
            while let Some(frame) = ws.next().await {
                let frame = frame.map_err(|e| {
                    StrandError::SessionDisconnected(format!("WebSocket read failed: {e}"))
                })?;
                if let Message::Text(text) = frame
                    && let Ok(value) = serde_json::from_str::<Value>(&text)
                    && value["id"].as_i64() == Some(id)
                {
                    if let Some(err) = value.get("error")
                        && !err.is_null()
                    {
                        return Err(driver_err(method, err["message"].as_str().unwrap_or("?")));
                    }
                    return Ok(value["result"].clone());
                }
            }
            Err(StrandError::SessionDisconnected(
                "WebSocket closed before response".into(),
            ))
        };

        let result = tokio::time::timeout(self.nav_timeout, recv)
            .await
            .map_err(|_| driver_err(method, "CDP command timed out"))?;
        let _ = ws.close(None).await;
        result
    }

    async fn eval_inner(&self, script: &str, await_promise: bool) -> strand_core::Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "returnByValue": true,
                    "awaitPromise": await_promise,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails")
            && !details.is_null()
        {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("script exception");
            return Err(driver_err("evaluate", text));
        }
        Ok(result["result"]["value"].clone())
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn navigate(&self, url: &str) -> strand_core::Result<()> {
        debug!(url, "CDP navigate");
        self.send_command("Page.navigate", json!({ "url": url }))
            .await?;

        // Poll readiness rather than subscribing to lifecycle events.
        let deadline = tokio::time::Instant::now() + self.nav_timeout;
        loop {
            let state = self.eval_inner("document.readyState", false).await?;
            if state.as_str() == Some("complete") || state.as_str() == Some("interactive") {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(driver_err("navigate", format!("page never settled: {url}")));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        self.eval_inner(CAPTURE_HOOK, false).await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> strand_core::Result<Value> {
        self.eval_inner(script, false).await
    }

    async fn evaluate_async(&self, script: &str) -> strand_core::Result<Value> {
        self.eval_inner(script, true).await
    }

    async fn find_elements(&self, selector: &str) -> strand_core::Result<Vec<ElementInfo>> {
        let script = format!(
            r#"
            JSON.stringify(Array.from(document.querySelectorAll({sel})).slice(0, 200).map(el => ({{
                tag: el.tagName.toLowerCase(),
                text: (el.innerText || '').slice(0, 512),
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
            }})))
            "#,
            sel = serde_json::to_string(selector)?,
        );
        let raw = self.eval_inner(&script, false).await?;
        let text = raw
            .as_str()
            .ok_or_else(|| driver_err("find_elements", "non-string result"))?;
        let elements: Vec<ElementInfo> = serde_json::from_str(text)
            .map_err(|e| driver_err("find_elements", format!("bad element JSON: {e}")))?;
        Ok(elements)
    }

    async fn screenshot(&self) -> strand_core::Result<Screenshot> {
        let result = self
            .send_command("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = result["data"]
            .as_str()
            .ok_or_else(|| driver_err("screenshot", "no image data"))?;
        Ok(Screenshot {
            data_base64: data.to_string(),
        })
    }

    async fn console_log(&self) -> strand_core::Result<Vec<ConsoleEntry>> {
        let raw = self
            .eval_inner("JSON.stringify(window.__strandConsole || [])", false)
            .await?;
        let text = raw.as_str().unwrap_or("[]");
        serde_json::from_str(text)
            .map_err(|e| driver_err("console_log", format!("bad console JSON: {e}")))
    }

    async fn network_log(&self) -> strand_core::Result<Vec<NetworkEntry>> {
        // Hooked responses first, then URLs recovered from resource timing
        // (covers requests issued before the hook was installed).
        let script = r#"
            JSON.stringify(
              (window.__strandNetwork || []).concat(
                performance.getEntriesByType('resource').map(e => ({
                  url: e.name, status: null, body: null,
                }))
              )
            )
        "#;
        let raw = self.eval_inner(script, false).await?;
        let text = raw.as_str().unwrap_or("[]");
        serde_json::from_str(text)
            .map_err(|e| driver_err("network_log", format!("bad network JSON: {e}")))
    }

    async fn current_url(&self) -> strand_core::Result<String> {
        let raw = self.eval_inner("window.location.href", false).await?;
        Ok(raw.as_str().unwrap_or_default().to_string())
    }

    async fn close(&self) -> strand_core::Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let tab_id = self.tab.lock().take().map(|t| t.id);
        if let Some(id) = tab_id {
            let url = format!("{}/json/close/{}", self.base_url, id);
            if let Err(e) = self.http.get(&url).send().await {
                warn!(error = %e, tab = %id, "CDP close tab failed");
            } else {
                info!(tab = %id, "CDP session closed");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
