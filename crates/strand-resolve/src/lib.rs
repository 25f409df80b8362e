//! # strand-resolve
//!
//! Ordered multi-strategy resolution. A [`ResolutionChain`] tries strategies
//! strictly in order, accepts the first candidate that passes the query's
//! validity predicate, and never invokes the strategies behind it. Individual
//! strategy failures are diagnostics, not control flow; only an expired
//! session aborts a chain.

mod api;
mod browser_log;
mod cache;
mod chain;
mod chains;
mod dom;
mod payload;
mod query;
mod validate;

pub use api::{ApiFeedPage, ApiReelLookup, ApiThreadProbe};
pub use browser_log::{NetworkLogScan, ScriptFeedFetch};
pub use cache::{CachedCapability, CapabilityCache};
pub use chain::{Candidate, ResolutionChain, Strategy};
pub use chains::{feed_page_chain, messageability_chain, story_media_chain};
pub use dom::{ComposerProbe, DomFeedScrape, DomMediaProbe};
pub use query::{
    CapabilityVerdict, FeedItem, FeedPage, FeedPageQuery, MediaKind, MediaRef,
    MessageabilityQuery, StoryMediaQuery,
};
pub use validate::media_url_valid;
