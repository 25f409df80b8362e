use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strand_config::{GatewayConfig, PolicyConfig, StrandConfig};
use strand_core::{
    CapabilityState, Channel, Clock, Confidence, ExitReason, ItemKey, ManualClock, MemoryRecorder,
    Outcome, SkipReason, StrandError,
};
use strand_driver::Driver;
use strand_flow::{
    Carousel, CarouselWalker, DeliveryPipeline, FeedWalker, ItemProcessor, ItemView, ScopePolicy,
    SessionFactory, TemplateReply, Workflows,
};
use strand_gateway::{ApiRequest, ApiResponse, RequestGateway, Transport};
use strand_resolve::{FeedItem, FeedPage, FeedPageQuery, ResolutionChain, Strategy};
use strand_state::{Gate, StateStore};

// ── Doubles ────────────────────────────────────────────────────

/// Transport double: replays queued responses, answers 200 once the queue
/// runs dry, and counts calls.
#[derive(Default)]
struct MockTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    fn push(&self, response: ApiResponse) {
        self.responses.lock().push_back(response);
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse> {
        self.calls.lock().push(request.clone());
        Ok(self.responses.lock().pop_front().unwrap_or(ApiResponse {
            status: 200,
            ..ApiResponse::default()
        }))
    }
}

/// Carousel double over a fixed item list. `looping` wraps around instead of
/// ending; `stuck` makes advance a no-op.
struct SeqCarousel {
    items: Vec<ItemView>,
    index: AtomicUsize,
    looping: bool,
    stuck: bool,
}

impl SeqCarousel {
    fn new(items: Vec<ItemView>) -> Self {
        Self {
            items,
            index: AtomicUsize::new(0),
            looping: false,
            stuck: false,
        }
    }

    fn looping(items: Vec<ItemView>) -> Self {
        Self {
            looping: true,
            ..Self::new(items)
        }
    }

    fn stuck(items: Vec<ItemView>) -> Self {
        Self {
            stuck: true,
            ..Self::new(items)
        }
    }
}

#[async_trait]
impl Carousel for SeqCarousel {
    async fn current(&self) -> strand_core::Result<Option<ItemView>> {
        let i = self.index.load(Ordering::SeqCst);
        if self.looping {
            return Ok(Some(self.items[i % self.items.len()].clone()));
        }
        Ok(self.items.get(i).cloned())
    }

    async fn advance(&self) -> strand_core::Result<()> {
        if !self.stuck {
            self.index.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Processor double: records every key it was handed and returns `Done`.
#[derive(Default)]
struct CountingProcessor {
    keys: Mutex<Vec<ItemKey>>,
}

impl CountingProcessor {
    fn keys(&self) -> Vec<ItemKey> {
        self.keys.lock().clone()
    }
}

#[async_trait]
impl ItemProcessor for CountingProcessor {
    async fn process(&self, _view: &ItemView, key: &ItemKey) -> strand_core::Result<Outcome> {
        self.keys.lock().push(key.clone());
        Ok(Outcome::Done)
    }
}

struct ErrProcessor {
    fatal: bool,
}

#[async_trait]
impl ItemProcessor for ErrProcessor {
    async fn process(&self, _view: &ItemView, _key: &ItemKey) -> strand_core::Result<Outcome> {
        if self.fatal {
            Err(StrandError::AuthExpired("cookie rejected".into()))
        } else {
            Err(StrandError::Config("broken template".into()))
        }
    }
}

/// Feed-page strategy double: pops canned pages and records the cursor each
/// query carried.
#[derive(Default)]
struct CannedFeed {
    pages: Mutex<VecDeque<FeedPage>>,
    cursors_seen: Mutex<Vec<Option<String>>>,
}

impl CannedFeed {
    fn push(&self, page: FeedPage) {
        self.pages.lock().push_back(page);
    }
}

#[async_trait]
impl Strategy<FeedPageQuery, FeedPage> for CannedFeed {
    fn name(&self) -> &'static str {
        "canned_feed"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    async fn attempt(&self, query: &FeedPageQuery) -> strand_core::Result<Option<FeedPage>> {
        self.cursors_seen.lock().push(query.cursor.clone());
        Ok(self.pages.lock().pop_front())
    }
}

/// Session factory for paths that must never open a browser.
struct NoSessions;

#[async_trait]
impl SessionFactory for NoSessions {
    async fn open(&self) -> strand_core::Result<Arc<dyn Driver>> {
        Err(StrandError::SessionDisconnected(
            "no browser in this test".into(),
        ))
    }
}

// ── Fixtures ───────────────────────────────────────────────────

fn view(owner: &str, item: &str) -> ItemView {
    ItemView {
        owner: Some(owner.to_string()),
        item_id: Some(item.to_string()),
        title: Some(format!("story by {owner}")),
        media_hint: Some(format!("https://cdn.example/{owner}/{item}.mp4")),
        canonical_url: Some(format!("https://www.example-platform.com/p/{item}/")),
        source_confidence: Confidence::High,
        ..ItemView::default()
    }
}

fn views(count: usize) -> Vec<ItemView> {
    (0..count)
        .map(|i| view(&format!("owner-{i}"), &format!("item-{i}")))
        .collect()
}

fn feed_item(owner: &str, item: &str) -> FeedItem {
    FeedItem {
        owner: owner.to_string(),
        item_id: Some(item.to_string()),
        canonical_url: Some(format!("https://www.example-platform.com/p/{item}/")),
        caption: Some("a day at the beach".to_string()),
        sponsored: false,
        attribution: None,
    }
}

fn feed_page(items: Vec<FeedItem>, next_cursor: Option<&str>) -> FeedPage {
    FeedPage {
        items,
        next_cursor: next_cursor.map(String::from),
    }
}

fn nav_config() -> strand_config::NavigationConfig {
    strand_config::NavigationConfig {
        safety_multiplier: 5,
        advance_retries: 2,
        max_pages: 20,
        settle_ms: 0,
    }
}

/// Gateway config with every delay zeroed so tests never sleep.
fn fast_gateway_config() -> GatewayConfig {
    GatewayConfig {
        max_attempts: 1,
        base_delay_ms: 0,
        rate_limit_base_delay_ms: 0,
        max_delay_ms: 0,
        jitter_ms: 0,
        pacing_cap_ms: 0,
        spacing_read_ms: 0,
        spacing_inbox_ms: 0,
        spacing_write_ms: 0,
        pause_rate_limited_secs: 1,
        pause_server_error_secs: 1,
    }
}

struct PipelineHarness {
    clock: Arc<ManualClock>,
    store: Arc<StateStore>,
    transport: Arc<MockTransport>,
    pipeline: DeliveryPipeline,
}

fn pipeline_harness(scope: &[&str]) -> PipelineHarness {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock.clone()).unwrap());
    let transport = Arc::new(MockTransport::default());
    let gateway = Arc::new(RequestGateway::new(
        "acct-1",
        fast_gateway_config(),
        transport.clone(),
        Arc::new(MemoryRecorder::default()),
        clock.clone(),
    ));
    let pipeline = DeliveryPipeline::new(
        "acct-1",
        "story_sync",
        Channel::StoryReply,
        gateway,
        None,
        store.clone(),
        Arc::new(TemplateReply::new(vec!["nice".into()])),
        PolicyConfig::default(),
        ScopePolicy::new(scope.iter().map(|s| s.to_string())),
    );
    PipelineHarness {
        clock,
        store,
        transport,
        pipeline,
    }
}

fn status_response(code: u16) -> ApiResponse {
    ApiResponse {
        status: code,
        ..ApiResponse::default()
    }
}

// ── Carousel walker ────────────────────────────────────────────

#[tokio::test]
async fn test_walker_stops_exactly_at_limit() {
    let carousel = SeqCarousel::new(views(10));
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 5).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::LimitReached);
    assert_eq!(stats.items_seen, 5);
    assert_eq!(stats.succeeded, 5);
    assert_eq!(processor.keys().len(), 5);
}

#[tokio::test]
async fn test_walker_reports_stream_end() {
    let carousel = SeqCarousel::new(views(3));
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 10).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::StreamEnd);
    assert_eq!(stats.items_seen, 3);
}

#[tokio::test]
async fn test_walker_never_processes_a_key_twice() {
    // The surface wraps A,B,A,B,... forever. Both items get processed once,
    // then the skip streak exceeds the retry allowance and the walk stops.
    let carousel = SeqCarousel::looping(views(2));
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 5).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::DuplicateKeyStalled);
    let keys = processor.keys();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
}

#[tokio::test]
async fn test_walker_stall_is_bounded_by_the_iteration_cap() {
    // Even with a generous limit, a looping surface must terminate well
    // inside limit * safety_multiplier iterations.
    let carousel = SeqCarousel::looping(views(2));
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 100).await.unwrap();

    assert!(!stats.exit_reason.is_healthy());
    assert!(processor.keys().len() <= 2);
}

#[tokio::test]
async fn test_walker_unmoving_surface_is_navigation_failure() {
    let carousel = SeqCarousel::stuck(views(1));
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 5).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::NavigationFailed);
    assert_eq!(stats.items_seen, 1);
}

#[tokio::test]
async fn test_walker_blank_view_ends_with_context_missing() {
    let carousel = SeqCarousel::new(vec![ItemView::default()]);
    let processor = CountingProcessor::default();
    let walker = CarouselWalker::new(nav_config());

    let stats = walker.run(&carousel, &processor, 5).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::ContextMissing);
    assert!(processor.keys().is_empty());
}

#[tokio::test]
async fn test_walker_propagates_expired_session() {
    let carousel = SeqCarousel::new(views(3));
    let walker = CarouselWalker::new(nav_config());

    let err = walker
        .run(&carousel, &ErrProcessor { fatal: true }, 5)
        .await
        .unwrap_err();

    assert!(matches!(err, StrandError::AuthExpired(_)));
}

#[tokio::test]
async fn test_walker_counts_nonfatal_processor_errors_as_failures() {
    let carousel = SeqCarousel::new(views(2));
    let walker = CarouselWalker::new(nav_config());

    let stats = walker
        .run(&carousel, &ErrProcessor { fatal: false }, 2)
        .await
        .unwrap();

    assert_eq!(stats.exit_reason, ExitReason::LimitReached);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.succeeded, 0);
}

// ── Feed walker ────────────────────────────────────────────────

fn feed_chain(feed: Arc<CannedFeed>) -> ResolutionChain<FeedPageQuery, FeedPage> {
    ResolutionChain::new().push(feed)
}

#[tokio::test]
async fn test_feed_duplicate_item_gets_one_side_effect() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock).unwrap());
    let feed = Arc::new(CannedFeed::default());
    feed.push(feed_page(
        vec![feed_item("alpha", "item-1"), feed_item("alpha", "item-1")],
        None,
    ));
    let processor = CountingProcessor::default();
    let walker = FeedWalker::new("acct-1", feed_chain(feed), store.clone(), nav_config());

    let stats = walker.run(&processor, 10).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::StreamEnd);
    assert_eq!(processor.keys().len(), 1);
    assert_eq!(stats.skipped_by_reason[&SkipReason::Duplicate], 1);
    // End of the feed resets the cursor.
    assert_eq!(store.cursor_get(&"acct-1".to_string(), "feed").unwrap(), None);
}

#[tokio::test]
async fn test_feed_cursor_flows_across_pages() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock).unwrap());
    let feed = Arc::new(CannedFeed::default());
    feed.push(feed_page(vec![feed_item("alpha", "item-1")], Some("c2")));
    feed.push(feed_page(vec![feed_item("beta", "item-2")], None));
    let processor = CountingProcessor::default();
    let walker = FeedWalker::new(
        "acct-1",
        feed_chain(feed.clone()),
        store.clone(),
        nav_config(),
    );

    let stats = walker.run(&processor, 10).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::StreamEnd);
    assert_eq!(processor.keys().len(), 2);
    let cursors = feed.cursors_seen.lock().clone();
    assert_eq!(cursors, vec![None, Some("c2".to_string())]);
}

#[tokio::test]
async fn test_feed_limit_leaves_the_cursor_on_the_unfinished_page() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock).unwrap());
    let feed = Arc::new(CannedFeed::default());
    feed.push(feed_page(
        vec![feed_item("a", "i1"), feed_item("b", "i2")],
        Some("c2"),
    ));
    feed.push(feed_page(
        vec![feed_item("c", "i3"), feed_item("d", "i4")],
        Some("c3"),
    ));
    let processor = CountingProcessor::default();
    let walker = FeedWalker::new("acct-1", feed_chain(feed), store.clone(), nav_config());

    let stats = walker.run(&processor, 3).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::LimitReached);
    assert_eq!(processor.keys().len(), 3);
    // The second page was interrupted mid-way, so the persisted cursor still
    // points at it; the next run re-fetches and dedups.
    assert_eq!(
        store.cursor_get(&"acct-1".to_string(), "feed").unwrap(),
        Some("c2".to_string())
    );
}

#[tokio::test]
async fn test_feed_page_budget_exhaustion_is_not_a_limit_exit() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock).unwrap());
    let feed = Arc::new(CannedFeed::default());
    feed.push(feed_page(vec![feed_item("a", "i1")], Some("c2")));
    feed.push(feed_page(vec![feed_item("b", "i2")], Some("c3")));
    let processor = CountingProcessor::default();
    let mut config = nav_config();
    config.max_pages = 2;
    let walker = FeedWalker::new("acct-1", feed_chain(feed), store.clone(), config);

    let stats = walker.run(&processor, 10).await.unwrap();

    // The item limit was never reached; the page bound tripped.
    assert_eq!(stats.exit_reason, ExitReason::NoProgress);
    assert_eq!(processor.keys().len(), 2);
    assert_eq!(
        store.cursor_get(&"acct-1".to_string(), "feed").unwrap(),
        Some("c3".to_string())
    );
}

#[tokio::test]
async fn test_feed_unresolved_page_is_navigation_failure() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock).unwrap());
    let feed = Arc::new(CannedFeed::default()); // empty queue: no page
    let processor = CountingProcessor::default();
    let walker = FeedWalker::new("acct-1", feed_chain(feed), store, nav_config());

    let stats = walker.run(&processor, 10).await.unwrap();

    assert_eq!(stats.exit_reason, ExitReason::NavigationFailed);
    assert!(processor.keys().is_empty());
}

// ── Delivery pipeline ──────────────────────────────────────────

#[tokio::test]
async fn test_pipeline_out_of_scope_owner_never_reaches_the_network() {
    let h = pipeline_harness(&["friend"]);
    let v = view("stranger", "item-1");
    let key = v.key().unwrap();

    let outcome = h.pipeline.process(&v, &key).await.unwrap();

    assert_eq!(outcome, Outcome::Skip(SkipReason::OutOfScope));
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn test_pipeline_respects_an_active_retry_window() {
    let h = pipeline_harness(&[]);
    let until = h.clock.now() + ChronoDuration::hours(1);
    h.store
        .mark(
            &"alpha".to_string(),
            Channel::StoryReply,
            CapabilityState::Unavailable,
            Some("previous refusal"),
            Some(until),
        )
        .unwrap();
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    let outcome = h.pipeline.process(&v, &key).await.unwrap();

    assert_eq!(outcome, Outcome::Skip(SkipReason::RetryWindowActive));
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn test_pipeline_promotional_skip_needs_high_confidence() {
    // A sponsored flag from a high-confidence surface blocks delivery.
    let h = pipeline_harness(&[]);
    let mut v = view("alpha", "item-1");
    v.sponsored = true;
    let key = v.key().unwrap();
    let outcome = h.pipeline.process(&v, &key).await.unwrap();
    assert_eq!(outcome, Outcome::Skip(SkipReason::Promotional));
    assert_eq!(h.transport.call_count(), 0);

    // The same flag from a scraped surface is not trusted enough to act on.
    let h = pipeline_harness(&[]);
    let mut v = view("alpha", "item-1");
    v.sponsored = true;
    v.source_confidence = Confidence::Low;
    let key = v.key().unwrap();
    let outcome = h.pipeline.process(&v, &key).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test]
async fn test_pipeline_suppresses_recently_answered_content() {
    let h = pipeline_harness(&[]);
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    assert_eq!(h.pipeline.process(&v, &key).await.unwrap(), Outcome::Done);
    assert_eq!(
        h.pipeline.process(&v, &key).await.unwrap(),
        Outcome::Skip(SkipReason::Duplicate)
    );
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_once_its_window_elapses() {
    let h = pipeline_harness(&[]);
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    // First attempt fails upstream and opens the transient window.
    h.transport.push(status_response(500));
    let outcome = h.pipeline.process(&v, &key).await.unwrap();
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert_eq!(h.transport.call_count(), 1);

    // Inside the window the item is deferred, never treated as answered.
    assert_eq!(
        h.pipeline.process(&v, &key).await.unwrap(),
        Outcome::Skip(SkipReason::RetryWindowActive)
    );
    assert_eq!(h.transport.call_count(), 1);

    // Past the window the delivery is attempted again and lands.
    h.clock.advance(ChronoDuration::hours(7));
    assert_eq!(h.pipeline.process(&v, &key).await.unwrap(), Outcome::Done);
    assert_eq!(h.transport.call_count(), 2);
}

#[tokio::test]
async fn test_pipeline_success_marks_the_owner_available() {
    let h = pipeline_harness(&[]);
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    let outcome = h.pipeline.process(&v, &key).await.unwrap();

    assert_eq!(outcome, Outcome::Done);
    let record = h
        .store
        .interaction(&"alpha".to_string(), Channel::StoryReply)
        .unwrap()
        .unwrap();
    assert_eq!(record.state, CapabilityState::Available);
    let counts = h
        .store
        .outcome_counts_since("1970-01-01T00:00:00+00:00")
        .unwrap();
    assert_eq!(counts, vec![("done".to_string(), 1)]);
}

#[tokio::test]
async fn test_pipeline_403_opens_the_long_retry_window() {
    let h = pipeline_harness(&[]);
    h.transport.push(status_response(403));
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    let outcome = h.pipeline.process(&v, &key).await.unwrap();
    assert!(matches!(outcome, Outcome::Failed(_)));

    // Still blocked after the transient window would have elapsed.
    h.clock.advance(ChronoDuration::hours(7));
    assert!(matches!(
        h.store.gate(&"alpha".to_string(), Channel::StoryReply).unwrap(),
        Gate::Skip { .. }
    ));
    // Open again once the 72h window passes.
    h.clock.advance(ChronoDuration::hours(66));
    assert!(matches!(
        h.store.gate(&"alpha".to_string(), Channel::StoryReply).unwrap(),
        Gate::Allow
    ));
}

#[tokio::test]
async fn test_pipeline_expired_session_aborts_the_run() {
    let h = pipeline_harness(&[]);
    h.transport.push(status_response(401));
    let v = view("alpha", "item-1");
    let key = v.key().unwrap();

    let err = h.pipeline.process(&v, &key).await.unwrap_err();

    assert!(matches!(err, StrandError::AuthExpired(_)));
}

// ── Capability refresh ─────────────────────────────────────────

fn thread_probe_response() -> ApiResponse {
    ApiResponse {
        status: 200,
        body: Some(serde_json::json!({
            "status": "ok",
            "thread": { "thread_id": "t-100" }
        })),
        ..ApiResponse::default()
    }
}

#[tokio::test]
async fn test_capability_refresh_does_not_reprobe_fresh_targets() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock.clone()).unwrap());
    let transport = Arc::new(MockTransport::default());
    let gateway = Arc::new(RequestGateway::new(
        "acct-1",
        fast_gateway_config(),
        transport.clone(),
        Arc::new(MemoryRecorder::default()),
        clock.clone(),
    ));
    let mut config = StrandConfig::default();
    config.account.account_id = "acct-1".into();
    config.account.scope = vec!["alpha".to_string()];
    config.gateway = fast_gateway_config();
    let workflows = Workflows::new(
        config,
        store.clone(),
        gateway,
        Arc::new(NoSessions),
        Arc::new(TemplateReply::default()),
    );

    transport.push(thread_probe_response());
    let first = workflows.capability_refresh(10).await.unwrap();
    assert_eq!(first.succeeded, 1);
    assert_eq!(transport.call_count(), 1);

    // The verdict is still fresh, so the second pass answers from the store
    // without issuing a probe.
    let second = workflows.capability_refresh(10).await.unwrap();
    assert_eq!(second.skipped_by_reason[&SkipReason::RetryWindowActive], 1);
    assert_eq!(transport.call_count(), 1);

    let record = store
        .interaction(&"alpha".to_string(), Channel::Message)
        .unwrap()
        .unwrap();
    assert_eq!(record.state, CapabilityState::Available);
}

#[tokio::test]
async fn test_capability_refresh_reprobes_after_freshness_lapses() {
    let clock = Arc::new(ManualClock::from_now());
    let store = Arc::new(StateStore::open_in_memory(clock.clone()).unwrap());
    let transport = Arc::new(MockTransport::default());
    let gateway = Arc::new(RequestGateway::new(
        "acct-1",
        fast_gateway_config(),
        transport.clone(),
        Arc::new(MemoryRecorder::default()),
        clock.clone(),
    ));
    let mut config = StrandConfig::default();
    config.account.account_id = "acct-1".into();
    config.account.scope = vec!["alpha".to_string()];
    config.gateway = fast_gateway_config();
    let freshness = config.policy.capability_freshness_secs as i64;
    let workflows = Workflows::new(
        config,
        store,
        gateway,
        Arc::new(NoSessions),
        Arc::new(TemplateReply::default()),
    );

    transport.push(thread_probe_response());
    workflows.capability_refresh(10).await.unwrap();
    assert_eq!(transport.call_count(), 1);

    clock.advance(ChronoDuration::seconds(freshness + 1));
    transport.push(thread_probe_response());
    let stats = workflows.capability_refresh(10).await.unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(transport.call_count(), 2);
}
