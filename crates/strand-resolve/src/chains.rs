//! Shipped chains, in the order the engine uses them: cheap and trusted
//! sources first, browser scraping last.

use std::sync::Arc;

use strand_driver::Driver;
use strand_gateway::{BrowserEscalation, RequestGateway};

use crate::api::{ApiFeedPage, ApiReelLookup, ApiThreadProbe};
use crate::browser_log::{NetworkLogScan, ScriptFeedFetch};
use crate::cache::{CachedCapability, CapabilityCache};
use crate::chain::ResolutionChain;
use crate::dom::{ComposerProbe, DomFeedScrape, DomMediaProbe};
use crate::query::{
    CapabilityVerdict, FeedPage, FeedPageQuery, MediaRef, MessageabilityQuery, StoryMediaQuery,
};

/// Story media: API reel lookup, then the captured network log, then the
/// rendered DOM.
pub fn story_media_chain(
    gateway: Arc<RequestGateway>,
    driver: Arc<dyn Driver>,
) -> ResolutionChain<StoryMediaQuery, MediaRef> {
    ResolutionChain::new()
        .push(Arc::new(ApiReelLookup::new(gateway)))
        .push(Arc::new(NetworkLogScan::new(driver.clone())))
        .push(Arc::new(DomMediaProbe::new(driver)))
}

/// Messageability: persisted state inside its freshness window, then the API
/// thread probe, then the visible composer.
pub fn messageability_chain(
    cache: Arc<dyn CapabilityCache>,
    gateway: Arc<RequestGateway>,
    driver: Arc<dyn Driver>,
) -> ResolutionChain<MessageabilityQuery, CapabilityVerdict> {
    ResolutionChain::new()
        .push(Arc::new(CachedCapability::new(cache)))
        .push(Arc::new(ApiThreadProbe::new(gateway)))
        .push(Arc::new(ComposerProbe::new(driver)))
}

/// Feed pages: API pagination, then an in-page script fetch when available,
/// then scraping visible links.
pub fn feed_page_chain(
    gateway: Arc<RequestGateway>,
    escalation: Option<Arc<dyn BrowserEscalation>>,
    driver: Arc<dyn Driver>,
) -> ResolutionChain<FeedPageQuery, FeedPage> {
    let mut chain = ResolutionChain::new().push(Arc::new(ApiFeedPage::new(gateway)));
    if let Some(escalation) = escalation {
        chain = chain.push(Arc::new(ScriptFeedFetch::new(escalation)));
    }
    chain.push(Arc::new(DomFeedScrape::new(driver)))
}
