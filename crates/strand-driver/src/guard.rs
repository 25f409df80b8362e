use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::Driver;

/// Scoped ownership of a driver session.
///
/// The workflow that acquires a session must release it on every exit path,
/// including error returns. Dropping an unclosed guard (a cancelled or
/// timed-out workflow) spawns the close so the browser session is still
/// released.
pub struct DriverGuard {
    driver: Arc<dyn Driver>,
    closed: AtomicBool,
}

impl DriverGuard {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            closed: AtomicBool::new(false),
        }
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// Release the session. Idempotent; errors are logged, not propagated,
    /// so cleanup never masks the original failure.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.driver.close().await {
            warn!(error = %e, "driver session close failed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) && self.driver.is_connected() {
            warn!("driver guard dropped without close; releasing the session in the background");
            let driver = Arc::clone(&self.driver);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = driver.close().await {
                        warn!(error = %e, "background driver close failed");
                    }
                });
            }
        }
    }
}
