//! # strand-driver
//!
//! Abstract browser-automation capability and its Chrome DevTools Protocol
//! implementation. The rest of the engine treats the driver purely as a
//! capability interface: it can perform the same logical fetch as the direct
//! API, read visible DOM elements, and read captured network traffic. No
//! specific script content is part of the contract.

mod cdp;
mod guard;
mod scripted;

pub use cdp::CdpDriver;
pub use guard::DriverGuard;
pub use scripted::ScriptedDriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A DOM element surfaced by [`Driver::find_elements`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

/// One captured console line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
}

/// One captured network response.
///
/// Entries from the in-page capture hook carry a status and possibly a body;
/// entries recovered from resource timing carry only the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub url: String,
    pub status: Option<u16>,
    pub body: Option<String>,
}

/// A screenshot captured from the current page.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Base64-encoded PNG image data.
    pub data_base64: String,
}

impl Screenshot {
    /// Decode the capture into raw PNG bytes.
    pub fn decode(&self) -> strand_core::Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.data_base64)
            .map_err(|e| strand_core::StrandError::ParseFailure(format!("bad screenshot data: {e}")))
    }
}

/// The browser-automation capability consumed by the engine.
///
/// One driver session is exclusively owned by one workflow invocation and is
/// released on every exit path (see [`DriverGuard`]).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate to a URL and wait for the document to settle.
    async fn navigate(&self, url: &str) -> strand_core::Result<()>;

    /// Evaluate a script synchronously, returning its value by value.
    async fn evaluate(&self, script: &str) -> strand_core::Result<Value>;

    /// Evaluate a script that returns a promise, awaiting its resolution.
    async fn evaluate_async(&self, script: &str) -> strand_core::Result<Value>;

    /// Collect elements matching a CSS selector.
    async fn find_elements(&self, selector: &str) -> strand_core::Result<Vec<ElementInfo>>;

    /// Capture a screenshot of the current viewport.
    async fn screenshot(&self) -> strand_core::Result<Screenshot>;

    /// Console lines captured since the last navigation.
    async fn console_log(&self) -> strand_core::Result<Vec<ConsoleEntry>>;

    /// Network responses captured since the last navigation.
    async fn network_log(&self) -> strand_core::Result<Vec<NetworkEntry>>;

    /// URL of the current page.
    async fn current_url(&self) -> strand_core::Result<String>;

    /// Release the session. Idempotent.
    async fn close(&self) -> strand_core::Result<()>;

    fn is_connected(&self) -> bool;
}
