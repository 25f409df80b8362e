use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use strand_config::StrandConfig;
use strand_core::{
    CapabilityState, Channel, ExitReason, Outcome, Result, SkipReason, StrandError, TargetId,
    WorkflowStats,
};
use strand_driver::{Driver, DriverGuard};
use strand_gateway::{RequestGateway, ScriptFetch};
use strand_resolve::{
    feed_page_chain, messageability_chain, story_media_chain, ApiThreadProbe, CachedCapability,
    CapabilityCache, MessageabilityQuery, ResolutionChain,
};
use strand_state::StateStore;

use crate::carousel::CarouselWalker;
use crate::feed::FeedWalker;
use crate::pipeline::{DeliveryPipeline, ScopePolicy};
use crate::reply::ReplyGenerator;
use crate::story::StoryCarousel;

/// Opens fresh browser sessions. A workflow acquires one session, owns it
/// exclusively, and releases it on every exit path.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn Driver>>;
}

/// Read adapter from the state store to the resolution layer's cache seam.
pub struct StoreCapabilityCache {
    store: Arc<StateStore>,
    freshness: Duration,
}

impl StoreCapabilityCache {
    pub fn new(store: Arc<StateStore>, freshness_secs: u64) -> Self {
        Self {
            store,
            freshness: Duration::seconds(freshness_secs as i64),
        }
    }
}

impl CapabilityCache for StoreCapabilityCache {
    fn fresh_state(&self, target: &TargetId, channel: Channel) -> Option<CapabilityState> {
        self.store
            .fresh_state(target, channel, self.freshness)
            .ok()
            .flatten()
    }
}

/// The engine's high-level workflows, wired over one account.
pub struct Workflows {
    config: StrandConfig,
    store: Arc<StateStore>,
    gateway: Arc<RequestGateway>,
    sessions: Arc<dyn SessionFactory>,
    reply: Arc<dyn ReplyGenerator>,
}

impl Workflows {
    pub fn new(
        config: StrandConfig,
        store: Arc<StateStore>,
        gateway: Arc<RequestGateway>,
        sessions: Arc<dyn SessionFactory>,
        reply: Arc<dyn ReplyGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            sessions,
            reply,
        }
    }

    fn scope(&self) -> ScopePolicy {
        ScopePolicy::new(self.config.account.scope.iter().cloned())
    }

    fn capability_cache(&self) -> Arc<dyn CapabilityCache> {
        Arc::new(StoreCapabilityCache::new(
            self.store.clone(),
            self.config.policy.capability_freshness_secs,
        ))
    }

    /// Walk the story carousel and reply to eligible items.
    pub async fn story_sync(&self, limit: u32) -> Result<WorkflowStats> {
        match self.story_sync_once(limit).await {
            Err(StrandError::SessionDisconnected(why)) => {
                warn!(error = %why, "browser session dropped; retrying from a fresh session");
                self.story_sync_once(limit).await
            }
            other => other,
        }
    }

    async fn story_sync_once(&self, limit: u32) -> Result<WorkflowStats> {
        let driver = self.sessions.open().await?;
        let guard = DriverGuard::new(driver.clone());
        let result = self.story_sync_with(driver, limit).await;
        guard.close().await;
        result
    }

    async fn story_sync_with(&self, driver: Arc<dyn Driver>, limit: u32) -> Result<WorkflowStats> {
        let carousel = StoryCarousel::open(driver.clone(), &self.config.navigation).await?;
        let pipeline = DeliveryPipeline::new(
            self.config.account.account_id.clone(),
            "story_sync",
            Channel::StoryReply,
            self.gateway.clone(),
            Some(story_media_chain(self.gateway.clone(), driver)),
            self.store.clone(),
            self.reply.clone(),
            self.config.policy.clone(),
            self.scope(),
        );
        let walker = CarouselWalker::new(self.config.navigation.clone());
        let stats = walker.run(&carousel, &pipeline, limit).await?;
        info!(
            items = stats.items_seen,
            succeeded = stats.succeeded,
            exit = %stats.exit_reason,
            "story sync finished"
        );
        Ok(stats)
    }

    /// Page through the home feed and message eligible owners.
    pub async fn feed_sync(&self, limit: u32) -> Result<WorkflowStats> {
        match self.feed_sync_once(limit).await {
            Err(StrandError::SessionDisconnected(why)) => {
                warn!(error = %why, "browser session dropped; retrying from a fresh session");
                self.feed_sync_once(limit).await
            }
            other => other,
        }
    }

    async fn feed_sync_once(&self, limit: u32) -> Result<WorkflowStats> {
        let driver = self.sessions.open().await?;
        let guard = DriverGuard::new(driver.clone());
        let result = self.feed_sync_with(driver, limit).await;
        guard.close().await;
        result
    }

    async fn feed_sync_with(&self, driver: Arc<dyn Driver>, limit: u32) -> Result<WorkflowStats> {
        let escalation = Arc::new(ScriptFetch::new(
            driver.clone(),
            self.config.account.api_base.clone(),
            self.config.account.app_id.clone(),
        ));
        let chain = feed_page_chain(self.gateway.clone(), Some(escalation), driver);
        let pipeline = DeliveryPipeline::new(
            self.config.account.account_id.clone(),
            "feed_sync",
            Channel::Message,
            self.gateway.clone(),
            None,
            self.store.clone(),
            self.reply.clone(),
            self.config.policy.clone(),
            self.scope(),
        );
        let walker = FeedWalker::new(
            self.config.account.account_id.clone(),
            chain,
            self.store.clone(),
            self.config.navigation.clone(),
        );
        let stats = walker.run(&pipeline, limit).await?;
        info!(
            items = stats.items_seen,
            succeeded = stats.succeeded,
            exit = %stats.exit_reason,
            "feed sync finished"
        );
        Ok(stats)
    }

    /// Re-probe capability state for known targets, through the full chain
    /// (persisted state, API probe, composer probe).
    pub async fn capability_scan(&self, limit: u32) -> Result<WorkflowStats> {
        match self.capability_scan_once(limit).await {
            Err(StrandError::SessionDisconnected(why)) => {
                warn!(error = %why, "browser session dropped; retrying from a fresh session");
                self.capability_scan_once(limit).await
            }
            other => other,
        }
    }

    async fn capability_scan_once(&self, limit: u32) -> Result<WorkflowStats> {
        let driver = self.sessions.open().await?;
        let guard = DriverGuard::new(driver.clone());
        let chain = messageability_chain(self.capability_cache(), self.gateway.clone(), driver);
        let result = self.probe_targets(&chain, limit).await;
        guard.close().await;
        result
    }

    /// Cheap fallback for degraded health: persisted state and the API probe
    /// only, no browser session.
    pub async fn capability_refresh(&self, limit: u32) -> Result<WorkflowStats> {
        let chain = ResolutionChain::new()
            .push(Arc::new(CachedCapability::new(self.capability_cache())))
            .push(Arc::new(ApiThreadProbe::new(self.gateway.clone())));
        self.probe_targets(&chain, limit).await
    }

    /// Targets worth probing: the configured scope when one exists, else
    /// every target the store has seen.
    fn scan_targets(&self) -> Result<Vec<TargetId>> {
        if !self.config.account.scope.is_empty() {
            return Ok(self.config.account.scope.clone());
        }
        self.store.known_targets()
    }

    async fn probe_targets(
        &self,
        chain: &ResolutionChain<MessageabilityQuery, strand_resolve::CapabilityVerdict>,
        limit: u32,
    ) -> Result<WorkflowStats> {
        let targets = self.scan_targets()?;
        let truncated = targets.len() > limit as usize;
        let mut stats = WorkflowStats::new(if truncated {
            ExitReason::LimitReached
        } else {
            ExitReason::StreamEnd
        });

        for target in targets.into_iter().take(limit as usize) {
            let query = MessageabilityQuery {
                target: target.clone(),
                channel: Channel::Message,
            };
            let outcome = match chain.resolve(&query).await {
                Ok(result) => {
                    // A cached answer is already persisted; re-marking it
                    // would keep refreshing its freshness forever.
                    if result.source_strategy == "cached_capability" {
                        debug!(target = %target, "capability still fresh");
                        Outcome::Skip(SkipReason::RetryWindowActive)
                    } else {
                        self.persist_verdict(&target, result.value.state)
                    }
                }
                Err(StrandError::Unresolved { .. }) => {
                    Outcome::Failed("no strategy produced a verdict".into())
                }
                Err(e) => return Err(e),
            };
            stats.record(&outcome);
        }

        info!(
            probed = stats.items_seen,
            exit = %stats.exit_reason,
            "capability pass finished"
        );
        Ok(stats)
    }

    fn persist_verdict(&self, target: &TargetId, state: CapabilityState) -> Outcome {
        let retry_after_at = (state == CapabilityState::Unavailable).then(|| {
            self.gateway.clock().now()
                + Duration::seconds(self.config.policy.transient_retry_window_secs as i64)
        });
        match self
            .store
            .mark(target, Channel::Message, state, Some("capability probe"), retry_after_at)
        {
            Ok(()) => Outcome::Done,
            Err(e) => {
                warn!(target = %target, error = %e, "failed to persist capability verdict");
                Outcome::Failed(e.to_string())
            }
        }
    }
}
