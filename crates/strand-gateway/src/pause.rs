//! Local rate-limit pauses: time-boxed suppression of calls to a given
//! (account, endpoint, target) after observing 429 or a server error.
//!
//! Last-write-wins semantics; expired entries are treated as absent and
//! evicted opportunistically. These are advisory hints, not mutexes — the
//! single-worker-per-account rule is what prevents duplicate sends.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::Endpoint;
use strand_core::{AccountId, Clock, StrandError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PauseKey {
    pub account: AccountId,
    pub endpoint: &'static str,
    pub target: Option<String>,
}

impl PauseKey {
    pub fn new(account: impl Into<AccountId>, endpoint: Endpoint, target: Option<&str>) -> Self {
        Self {
            account: account.into(),
            endpoint: endpoint.name(),
            target: target.map(|t| t.to_string()),
        }
    }
}

/// One active pause row.
#[derive(Debug, Clone)]
pub struct RateLimitPause {
    pub unblock_at: DateTime<Utc>,
    pub reason: String,
    /// Rate-limit headers observed on the response that created the pause.
    pub rate_limit_headers: HashMap<String, String>,
}

/// Shared pause map with an injected clock.
pub struct PauseStore {
    inner: DashMap<PauseKey, RateLimitPause>,
    clock: Arc<dyn Clock>,
}

impl PauseStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: DashMap::new(),
            clock,
        }
    }

    /// Create or refresh a pause. `unblock_at` must be strictly in the
    /// future; a non-future value is a caller bug and is rejected.
    pub fn set(&self, key: PauseKey, pause: RateLimitPause) -> strand_core::Result<()> {
        let now = self.clock.now();
        if pause.unblock_at <= now {
            return Err(StrandError::InvalidTransition(format!(
                "pause unblock_at {} is not in the future (now {})",
                pause.unblock_at, now
            )));
        }
        debug!(
            account = %key.account,
            endpoint = key.endpoint,
            target = ?key.target,
            unblock_at = %pause.unblock_at,
            reason = %pause.reason,
            "rate-limit pause set"
        );
        self.inner.insert(key, pause);
        Ok(())
    }

    /// Convenience: pause for `secs` from now.
    pub fn pause_for(
        &self,
        key: PauseKey,
        secs: u64,
        reason: impl Into<String>,
        rate_limit_headers: HashMap<String, String>,
    ) -> strand_core::Result<()> {
        let unblock_at = self.clock.now() + ChronoDuration::seconds(secs.max(1) as i64);
        self.set(
            key,
            RateLimitPause {
                unblock_at,
                reason: reason.into(),
                rate_limit_headers,
            },
        )
    }

    /// The active (unexpired) pause for a key, if any. Expired entries are
    /// removed on the way out.
    pub fn active(&self, key: &PauseKey) -> Option<RateLimitPause> {
        let now = self.clock.now();
        if let Some(entry) = self.inner.get(key) {
            if entry.unblock_at > now {
                return Some(entry.clone());
            }
        } else {
            return None;
        }
        self.inner.remove(key);
        None
    }

    /// Drop every expired entry. Call periodically from a maintenance task.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        let before = self.inner.len();
        self.inner.retain(|_, pause| pause.unblock_at > now);
        let removed = before - self.inner.len();
        if removed > 0 {
            warn!(removed, "purged expired rate-limit pauses");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::ManualClock;

    fn store() -> (Arc<ManualClock>, PauseStore) {
        let clock = Arc::new(ManualClock::from_now());
        let store = PauseStore::new(clock.clone());
        (clock, store)
    }

    fn key() -> PauseKey {
        PauseKey::new("acct", Endpoint::FeedTimeline, Some("t-1"))
    }

    #[test]
    fn test_pause_visible_until_expiry() {
        let (clock, store) = store();
        store
            .pause_for(key(), 30, "rate_limited", HashMap::new())
            .unwrap();

        clock.advance(ChronoDuration::seconds(10));
        assert!(store.active(&key()).is_some());

        clock.advance(ChronoDuration::seconds(21));
        assert!(store.active(&key()).is_none());
        // Expired entry was evicted by the read
        assert!(store.is_empty());
    }

    #[test]
    fn test_unblock_at_must_be_future() {
        let (clock, store) = store();
        let past = RateLimitPause {
            unblock_at: clock.now() - ChronoDuration::seconds(1),
            reason: "rate_limited".into(),
            rate_limit_headers: HashMap::new(),
        };
        assert!(store.set(key(), past).is_err());
    }

    #[test]
    fn test_keys_are_target_scoped() {
        let (_clock, store) = store();
        store
            .pause_for(key(), 60, "rate_limited", HashMap::new())
            .unwrap();
        let other = PauseKey::new("acct", Endpoint::FeedTimeline, Some("t-2"));
        assert!(store.active(&other).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let (clock, store) = store();
        store
            .pause_for(key(), 5, "server_error", HashMap::new())
            .unwrap();
        clock.advance(ChronoDuration::seconds(10));
        store.purge_expired();
        assert!(store.is_empty());
    }
}
