use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use strand_core::{Confidence, StrandError};
use strand_resolve::{MediaKind, MediaRef, ResolutionChain, StoryMediaQuery, Strategy};

/// What a canned strategy does when invoked.
enum Canned {
    Media(MediaRef),
    Nothing,
    ParseFail(&'static str),
    AuthExpired,
}

/// Counting strategy double.
struct CannedStrategy {
    name: &'static str,
    confidence: Confidence,
    outcome: Canned,
    calls: AtomicU32,
}

impl CannedStrategy {
    fn new(name: &'static str, confidence: Confidence, outcome: Canned) -> Arc<Self> {
        Arc::new(Self {
            name,
            confidence,
            outcome,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy<StoryMediaQuery, MediaRef> for CannedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn confidence(&self) -> Confidence {
        self.confidence
    }

    async fn attempt(&self, _query: &StoryMediaQuery) -> strand_core::Result<Option<MediaRef>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Canned::Media(media) => Ok(Some(media.clone())),
            Canned::Nothing => Ok(None),
            Canned::ParseFail(msg) => Err(StrandError::ParseFailure((*msg).to_string())),
            Canned::AuthExpired => Err(StrandError::AuthExpired("logged out".into())),
        }
    }
}

fn media(url: &str) -> MediaRef {
    MediaRef {
        url: url.to_string(),
        kind: MediaKind::Image,
        story_ref: None,
    }
}

fn query() -> StoryMediaQuery {
    StoryMediaQuery {
        owner: "alpha".into(),
        item_hint: None,
    }
}

#[tokio::test]
async fn test_accepted_candidate_short_circuits() {
    let first = CannedStrategy::new(
        "api_reel_lookup",
        Confidence::High,
        Canned::Media(media("https://cdn.example.com/a.jpg")),
    );
    let second = CannedStrategy::new("network_log_scan", Confidence::Medium, Canned::Nothing);

    let chain = ResolutionChain::new()
        .push(first.clone())
        .push(second.clone());
    let result = chain.resolve(&query()).await.unwrap();

    assert_eq!(result.source_strategy, "api_reel_lookup");
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn test_parse_failure_falls_through_to_browser_log() {
    let api = CannedStrategy::new(
        "api_reel_lookup",
        Confidence::High,
        Canned::ParseFail("reel_lookup: missing field"),
    );
    let log = CannedStrategy::new(
        "network_log_scan",
        Confidence::Medium,
        Canned::Media(media("https://cdn.example.com/story.mp4")),
    );
    let dom = CannedStrategy::new("dom_media_probe", Confidence::Low, Canned::Nothing);

    let chain = ResolutionChain::new()
        .push(api.clone())
        .push(log.clone())
        .push(dom.clone());
    let result = chain.resolve(&query()).await.unwrap();

    assert_eq!(result.value.url, "https://cdn.example.com/story.mp4");
    assert_eq!(result.source_strategy, "network_log_scan");
    assert_eq!(result.confidence, Confidence::Medium);
    // The strategy behind the accepted one was never consulted.
    assert_eq!(dom.calls(), 0);
}

#[tokio::test]
async fn test_exhausted_chain_aggregates_reasons() {
    let api = CannedStrategy::new(
        "api_reel_lookup",
        Confidence::High,
        Canned::ParseFail("bad shape"),
    );
    let log = CannedStrategy::new("network_log_scan", Confidence::Medium, Canned::Nothing);

    let chain = ResolutionChain::new().push(api).push(log);
    let err = chain.resolve(&query()).await.unwrap_err();

    match err {
        StrandError::Unresolved { reasons } => {
            assert_eq!(reasons.len(), 2);
            assert!(reasons[0].starts_with("api_reel_lookup:"));
            assert!(reasons[1].contains("no result"));
        }
        other => panic!("expected Unresolved, got {other}"),
    }
}

#[tokio::test]
async fn test_invalid_candidate_is_rejected_not_accepted() {
    // The first strategy proposes a placeholder asset; validation rejects it
    // and the chain moves on.
    let api = CannedStrategy::new(
        "api_reel_lookup",
        Confidence::High,
        Canned::Media(media("https://cdn.example.com/default_avatar.png")),
    );
    let log = CannedStrategy::new(
        "network_log_scan",
        Confidence::Medium,
        Canned::Media(media("https://cdn.example.com/real.jpg")),
    );

    let chain = ResolutionChain::new().push(api).push(log);
    let result = chain.resolve(&query()).await.unwrap();
    assert_eq!(result.value.url, "https://cdn.example.com/real.jpg");
    assert_eq!(result.source_strategy, "network_log_scan");
}

#[tokio::test]
async fn test_expired_session_aborts_the_chain() {
    let api = CannedStrategy::new("api_reel_lookup", Confidence::High, Canned::AuthExpired);
    let log = CannedStrategy::new("network_log_scan", Confidence::Medium, Canned::Nothing);

    let chain = ResolutionChain::new().push(api).push(log.clone());
    let err = chain.resolve(&query()).await.unwrap_err();

    assert!(matches!(err, StrandError::AuthExpired(_)));
    assert_eq!(log.calls(), 0);
}
