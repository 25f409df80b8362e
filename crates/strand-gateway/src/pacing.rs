//! Per-endpoint request spacing marks. Overwritten on every call; the mark
//! records when the next call to that endpoint is allowed.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Endpoint, EndpointClass};
use strand_core::{AccountId, Clock};
use strand_config::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SpacingKey {
    account: AccountId,
    endpoint: &'static str,
}

/// Shared spacing map with an injected clock.
pub struct SpacingStore {
    inner: DashMap<SpacingKey, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl SpacingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: DashMap::new(),
            clock,
        }
    }

    /// How long the caller must still wait before hitting this endpoint.
    /// Zero when no mark exists or the mark is in the past.
    pub fn wait_needed(&self, account: &str, endpoint: Endpoint) -> Duration {
        let key = SpacingKey {
            account: account.to_string(),
            endpoint: endpoint.name(),
        };
        let now = self.clock.now();
        match self.inner.get(&key) {
            Some(next_allowed) if *next_allowed > now => (*next_allowed - now)
                .to_std()
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Overwrite the mark: next call allowed at now + the endpoint's spacing.
    pub fn mark(&self, account: &str, endpoint: Endpoint, config: &GatewayConfig) {
        let spacing_ms = match endpoint.class() {
            EndpointClass::Read => config.spacing_read_ms,
            EndpointClass::Inbox => config.spacing_inbox_ms,
            EndpointClass::Write => config.spacing_write_ms,
        };
        let key = SpacingKey {
            account: account.to_string(),
            endpoint: endpoint.name(),
        };
        let next_allowed = self.clock.now() + ChronoDuration::milliseconds(spacing_ms as i64);
        self.inner.insert(key, next_allowed);
    }
}
