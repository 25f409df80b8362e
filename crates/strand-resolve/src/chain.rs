use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use strand_core::{Confidence, ExtractionResult, Result, StoryRef, StrandError};

/// One way of answering a query. Strategies are cheap to construct and hold
/// their collaborators (gateway, driver) behind `Arc`s.
#[async_trait]
pub trait Strategy<Q, V>: Send + Sync {
    /// Stable name, recorded as provenance on the accepted result.
    fn name(&self) -> &'static str;

    /// Trust level intrinsic to this source.
    fn confidence(&self) -> Confidence;

    /// Try to produce a candidate. `Ok(None)` means "no result here"; an
    /// `Err` is folded into the chain's failure reasons unless it signals an
    /// expired session.
    async fn attempt(&self, query: &Q) -> Result<Option<V>>;
}

/// A value a strategy can propose. Validation is part of the value's type so
/// every chain for that query kind applies the same predicate.
pub trait Candidate: Send + Sync {
    /// Accept or reject the candidate, with a reason on rejection.
    fn validate(&self) -> std::result::Result<(), String>;

    /// Owner + item identifiers, when the value concerns a story item.
    fn story_ref(&self) -> Option<StoryRef> {
        None
    }
}

/// Ordered list of strategies for one query kind.
pub struct ResolutionChain<Q, V> {
    strategies: Vec<Arc<dyn Strategy<Q, V>>>,
}

impl<Q, V> Default for ResolutionChain<Q, V> {
    fn default() -> Self {
        Self { strategies: vec![] }
    }
}

impl<Q: Send + Sync, V: Candidate> ResolutionChain<Q, V> {
    pub fn new() -> Self {
        Self { strategies: vec![] }
    }

    pub fn push(mut self, strategy: Arc<dyn Strategy<Q, V>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order and return the first validated candidate.
    ///
    /// Strategies behind the accepted one are never invoked. If none yields a
    /// valid candidate, the per-strategy failure reasons are aggregated into
    /// [`StrandError::Unresolved`] and the caller decides whether that is
    /// terminal or retryable.
    pub async fn resolve(&self, query: &Q) -> Result<ExtractionResult<V>> {
        let mut reasons = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            match strategy.attempt(query).await {
                Ok(Some(candidate)) => match candidate.validate() {
                    Ok(()) => {
                        debug!(
                            strategy = strategy.name(),
                            confidence = %strategy.confidence(),
                            "candidate accepted"
                        );
                        let story_ref = candidate.story_ref();
                        return Ok(ExtractionResult {
                            value: candidate,
                            source_strategy: strategy.name().to_string(),
                            confidence: strategy.confidence(),
                            story_ref,
                        });
                    }
                    Err(why) => {
                        debug!(strategy = strategy.name(), reason = %why, "candidate rejected");
                        reasons.push(format!("{}: {why}", strategy.name()));
                    }
                },
                Ok(None) => {
                    debug!(strategy = strategy.name(), "no result");
                    reasons.push(format!("{}: no result", strategy.name()));
                }
                // An expired session makes every remaining strategy futile.
                Err(StrandError::AuthExpired(msg)) => {
                    return Err(StrandError::AuthExpired(msg));
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "strategy failed");
                    reasons.push(format!("{}: {e}", strategy.name()));
                }
            }
        }

        Err(StrandError::Unresolved { reasons })
    }
}
