use async_trait::async_trait;
use std::sync::Arc;

use strand_core::{CapabilityState, Channel, Confidence, Result, TargetId};

use crate::chain::Strategy;
use crate::query::{CapabilityVerdict, MessageabilityQuery};

/// Read side of the interaction-state store, as seen by resolution.
pub trait CapabilityCache: Send + Sync {
    /// A persisted state still inside its freshness window, if any.
    fn fresh_state(&self, target: &TargetId, channel: Channel) -> Option<CapabilityState>;
}

/// First strategy in the messageability chain: answer from persisted state so
/// a target probed recently is never probed again inside the freshness
/// window.
pub struct CachedCapability {
    cache: Arc<dyn CapabilityCache>,
}

impl CachedCapability {
    pub fn new(cache: Arc<dyn CapabilityCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Strategy<MessageabilityQuery, CapabilityVerdict> for CachedCapability {
    fn name(&self) -> &'static str {
        "cached_capability"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    async fn attempt(&self, query: &MessageabilityQuery) -> Result<Option<CapabilityVerdict>> {
        Ok(self
            .cache
            .fresh_state(&query.target, query.channel)
            .filter(|state| *state != CapabilityState::Unknown)
            .map(CapabilityVerdict::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedCache(Mutex<Option<CapabilityState>>);

    impl CapabilityCache for FixedCache {
        fn fresh_state(&self, _target: &TargetId, _channel: Channel) -> Option<CapabilityState> {
            *self.0.lock()
        }
    }

    #[tokio::test]
    async fn test_cached_state_short_circuits_probes() {
        let cache = Arc::new(FixedCache(Mutex::new(Some(CapabilityState::ReactionOnly))));
        let strategy = CachedCapability::new(cache.clone());
        let query = MessageabilityQuery {
            target: "alpha".into(),
            channel: Channel::Message,
        };

        let verdict = strategy.attempt(&query).await.unwrap().unwrap();
        assert_eq!(verdict.state, CapabilityState::ReactionOnly);

        // Stale or unknown state produces no candidate, so probes run.
        *cache.0.lock() = Some(CapabilityState::Unknown);
        assert!(strategy.attempt(&query).await.unwrap().is_none());
        *cache.0.lock() = None;
        assert!(strategy.attempt(&query).await.unwrap().is_none());
    }
}
