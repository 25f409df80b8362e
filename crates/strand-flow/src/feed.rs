use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use strand_config::NavigationConfig;
use strand_core::{
    AccountId, ExitReason, ItemKey, Outcome, Result, SkipReason, StrandError, WorkflowStats,
};
use strand_resolve::{FeedItem, FeedPage, FeedPageQuery, ResolutionChain};
use strand_state::StateStore;

use crate::carousel::{ItemProcessor, ItemView};

/// Cursor stream name for the home feed.
const FEED_STREAM: &str = "feed";

impl From<&FeedItem> for ItemView {
    fn from(item: &FeedItem) -> Self {
        ItemView {
            owner: if item.owner.is_empty() {
                None
            } else {
                Some(item.owner.clone())
            },
            item_id: item.item_id.clone(),
            title: item.caption.clone(),
            media_hint: item.canonical_url.clone(),
            canonical_url: item.canonical_url.clone(),
            sponsored: item.sponsored,
            attribution: item.attribution.clone(),
            source_confidence: strand_core::Confidence::Low,
        }
    }
}

/// Explicit iterative pagination over the home feed, with cursor persistence
/// and a page bound. Recursion-free by construction.
pub struct FeedWalker {
    account: AccountId,
    chain: ResolutionChain<FeedPageQuery, FeedPage>,
    store: Arc<StateStore>,
    config: NavigationConfig,
}

impl FeedWalker {
    pub fn new(
        account: impl Into<AccountId>,
        chain: ResolutionChain<FeedPageQuery, FeedPage>,
        store: Arc<StateStore>,
        config: NavigationConfig,
    ) -> Self {
        Self {
            account: account.into(),
            chain,
            store,
            config,
        }
    }

    /// Walk pages until `limit` items were processed, the feed ends, or the
    /// page bound trips. The cursor is persisted after every page so an
    /// interrupted run resumes where it left off.
    pub async fn run(&self, processor: &dyn ItemProcessor, limit: u32) -> Result<WorkflowStats> {
        let mut cursor = self.store.cursor_get(&self.account, FEED_STREAM)?;
        let mut visited: HashSet<ItemKey> = HashSet::new();
        // Tripping the page bound without reaching the item limit reports
        // `NoProgress`, the same as the carousel's safety cap.
        let mut stats = WorkflowStats::new(ExitReason::NoProgress);
        let mut processed: u32 = 0;
        let mut pages: u32 = 0;

        'pages: while pages < self.config.max_pages {
            let query = FeedPageQuery {
                account: self.account.clone(),
                cursor: cursor.clone(),
            };
            let (page, page_confidence) = match self.chain.resolve(&query).await {
                Ok(result) => (result.value, result.confidence),
                Err(StrandError::Unresolved { reasons }) => {
                    warn!(reasons = ?reasons, "feed page unresolved");
                    stats.exit_reason = ExitReason::NavigationFailed;
                    break;
                }
                Err(e) => return Err(e),
            };
            pages += 1;
            debug!(page = pages, items = page.items.len(), "feed page resolved");

            for item in &page.items {
                if processed >= limit {
                    stats.exit_reason = ExitReason::LimitReached;
                    break 'pages;
                }
                let mut view = ItemView::from(item);
                view.source_confidence = page_confidence;
                let Some(key) = view.key() else {
                    stats.record(&Outcome::Skip(SkipReason::IdentityUnresolved));
                    continue;
                };
                if !visited.insert(key.clone()) {
                    // Same composite key twice in one run: skip without a
                    // second side-effect execution.
                    stats.record(&Outcome::Skip(SkipReason::Duplicate));
                    continue;
                }

                let outcome = match processor.process(&view, &key).await {
                    Ok(outcome) => outcome,
                    Err(
                        e @ (StrandError::AuthExpired(_) | StrandError::SessionDisconnected(_)),
                    ) => return Err(e),
                    Err(e) => {
                        warn!(key = %key, error = %e, "feed item processing failed");
                        Outcome::Failed(e.to_string())
                    }
                };
                stats.record(&outcome);
                processed += 1;
            }

            match page.next_cursor {
                Some(next) => {
                    self.store.cursor_put(&self.account, FEED_STREAM, &next)?;
                    cursor = Some(next);
                }
                None => {
                    // End of the feed: restart from the top next run.
                    self.store.cursor_clear(&self.account, FEED_STREAM)?;
                    stats.exit_reason = ExitReason::StreamEnd;
                    break;
                }
            }
        }

        info!(
            account = %self.account,
            pages,
            items = stats.items_seen,
            exit = %stats.exit_reason,
            "feed walk finished"
        );
        Ok(stats)
    }
}
