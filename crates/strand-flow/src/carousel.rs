use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

use strand_config::NavigationConfig;
use strand_core::{
    content_signature, Confidence, ExitReason, ItemKey, Outcome, Result, StrandError, TargetId,
    WorkflowStats,
};

/// What the navigation surface can tell us about the item in view, before
/// any resolution work. Every field is best-effort.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub owner: Option<TargetId>,
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub media_hint: Option<String>,
    pub canonical_url: Option<String>,
    pub sponsored: bool,
    pub attribution: Option<String>,
    /// Trust in the surface that produced this view.
    pub source_confidence: Confidence,
}

impl Default for ItemView {
    fn default() -> Self {
        Self {
            owner: None,
            item_id: None,
            title: None,
            media_hint: None,
            canonical_url: None,
            sponsored: false,
            attribution: None,
            source_confidence: Confidence::Low,
        }
    }
}

impl ItemView {
    /// Composite dedup key: identity when owner and item id both resolved,
    /// else a signature over the visible fields. `None` when the view is
    /// completely blank.
    pub fn key(&self) -> Option<ItemKey> {
        if let (Some(owner), Some(item)) = (&self.owner, &self.item_id)
            && !owner.is_empty()
            && !item.is_empty()
        {
            return Some(ItemKey::identity(owner.clone(), item.clone()));
        }
        if self.owner.as_deref().unwrap_or("").is_empty()
            && self.title.as_deref().unwrap_or("").is_empty()
            && self.media_hint.as_deref().unwrap_or("").is_empty()
        {
            return None;
        }
        Some(ItemKey::Signature(self.signature()))
    }

    /// Content signature used to verify forward movement between items.
    pub fn signature(&self) -> String {
        content_signature(&[
            self.owner.as_deref().unwrap_or(""),
            self.item_id.as_deref().unwrap_or(""),
            self.title.as_deref().unwrap_or(""),
            self.media_hint.as_deref().unwrap_or(""),
        ])
    }
}

/// A sequential content surface traversed one item at a time.
#[async_trait]
pub trait Carousel: Send + Sync {
    /// The item currently in view, or `None` when the stream is exhausted.
    async fn current(&self) -> Result<Option<ItemView>>;

    /// Move to the next item. Movement is verified by the walker, not here.
    async fn advance(&self) -> Result<()>;
}

/// Runs one item through the fixed pipeline.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, view: &ItemView, key: &ItemKey) -> Result<Outcome>;
}

fn is_fatal_here(err: &StrandError) -> bool {
    matches!(
        err,
        StrandError::AuthExpired(_) | StrandError::SessionDisconnected(_)
    )
}

/// Drives a [`Carousel`] to completion under the configured safety bounds.
pub struct CarouselWalker {
    config: NavigationConfig,
}

impl CarouselWalker {
    pub fn new(config: NavigationConfig) -> Self {
        Self { config }
    }

    /// Walk until `limit` items were processed, the stream ends, or a safety
    /// bound trips. Only an expired session or a dropped browser session
    /// surface as `Err`; everything else is a typed exit reason.
    pub async fn run(
        &self,
        carousel: &dyn Carousel,
        processor: &dyn ItemProcessor,
        limit: u32,
    ) -> Result<WorkflowStats> {
        let cap = (limit as u64)
            .saturating_mul(self.config.safety_multiplier as u64)
            .max(1);
        let mut visited: HashSet<ItemKey> = HashSet::new();
        let mut stats = WorkflowStats::new(ExitReason::NoProgress);
        let mut processed: u32 = 0;
        let mut iterations: u64 = 0;
        let mut skip_streak: u32 = 0;

        loop {
            if processed >= limit {
                stats.exit_reason = ExitReason::LimitReached;
                break;
            }
            if iterations >= cap {
                warn!(iterations, cap, "iteration cap hit without reaching the limit");
                stats.exit_reason = ExitReason::NoProgress;
                break;
            }
            iterations += 1;

            let view = match carousel.current().await {
                Ok(Some(view)) => view,
                Ok(None) => {
                    stats.exit_reason = ExitReason::StreamEnd;
                    break;
                }
                Err(e) if is_fatal_here(&e) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "failed to read the current item");
                    stats.exit_reason = ExitReason::NavigationFailed;
                    break;
                }
            };
            let Some(key) = view.key() else {
                stats.exit_reason = ExitReason::ContextMissing;
                break;
            };

            if visited.contains(&key) {
                skip_streak += 1;
                debug!(key = %key, streak = skip_streak, "already visited in this run");
                if skip_streak > self.config.advance_retries
                    || !self.advance_verified(carousel, &view).await?
                {
                    stats.exit_reason = ExitReason::DuplicateKeyStalled;
                    break;
                }
                continue;
            }
            skip_streak = 0;
            visited.insert(key.clone());

            let outcome = match processor.process(&view, &key).await {
                Ok(outcome) => outcome,
                Err(e) if is_fatal_here(&e) => return Err(e),
                Err(e) => {
                    warn!(key = %key, error = %e, "item processing failed");
                    Outcome::Failed(e.to_string())
                }
            };
            stats.record(&outcome);
            processed += 1;
            if processed >= limit {
                stats.exit_reason = ExitReason::LimitReached;
                break;
            }

            if !self.advance_verified(carousel, &view).await? {
                stats.exit_reason = ExitReason::NavigationFailed;
                break;
            }
        }

        Ok(stats)
    }

    /// Advance and confirm the surface actually moved, retrying a bounded
    /// number of times. Returns false when every attempt left the same item
    /// in view.
    async fn advance_verified(&self, carousel: &dyn Carousel, from: &ItemView) -> Result<bool> {
        let before = from.signature();
        for attempt in 0..=self.config.advance_retries {
            match carousel.advance().await {
                Ok(()) => {}
                Err(e) if is_fatal_here(&e) => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "advance failed");
                    continue;
                }
            }
            match carousel.current().await {
                // The stream ending counts as movement.
                Ok(None) => return Ok(true),
                Ok(Some(next)) if next.signature() != before => return Ok(true),
                Ok(Some(_)) => debug!(attempt, "no movement after advance"),
                Err(e) if is_fatal_here(&e) => return Err(e),
                Err(e) => warn!(attempt, error = %e, "failed to verify movement"),
            }
        }
        Ok(false)
    }
}
