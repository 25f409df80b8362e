use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use strand_config::GatewayConfig;
use strand_core::{ManualClock, MemoryRecorder, StrandError};
use strand_gateway::{
    ApiRequest, ApiResponse, BrowserEscalation, Endpoint, FailureReason, RequestGateway, Transport,
};

/// Transport double: replays queued responses and counts calls.
#[derive(Default)]
struct MockTransport {
    responses: Mutex<VecDeque<strand_core::Result<ApiResponse>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    fn push(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    fn push_err(&self, err: StrandError) {
        self.responses.lock().push_back(Err(err));
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse> {
        self.calls.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(status(200)))
    }
}

struct MockEscalation {
    response: Mutex<Option<ApiResponse>>,
    calls: Mutex<u32>,
}

impl MockEscalation {
    fn returning(response: ApiResponse) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl BrowserEscalation for MockEscalation {
    async fn fetch(&self, _request: &ApiRequest) -> strand_core::Result<ApiResponse> {
        *self.calls.lock() += 1;
        self.response
            .lock()
            .take()
            .ok_or_else(|| StrandError::SessionDisconnected("no canned response".into()))
    }
}

fn status(code: u16) -> ApiResponse {
    ApiResponse {
        status: code,
        headers: HashMap::new(),
        body: None,
    }
}

fn status_with_retry_after(code: u16, secs: u64) -> ApiResponse {
    let mut resp = status(code);
    resp.headers
        .insert("retry-after".to_string(), secs.to_string());
    resp
}

/// Config with zeroed delays so tests never sleep meaningfully.
fn fast_config() -> GatewayConfig {
    GatewayConfig {
        max_attempts: 3,
        base_delay_ms: 0,
        rate_limit_base_delay_ms: 0,
        max_delay_ms: 0,
        jitter_ms: 0,
        pacing_cap_ms: 0,
        spacing_read_ms: 0,
        spacing_inbox_ms: 0,
        spacing_write_ms: 0,
        ..GatewayConfig::default()
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    transport: Arc<MockTransport>,
    recorder: Arc<MemoryRecorder>,
    gateway: RequestGateway,
}

fn harness(config: GatewayConfig) -> Harness {
    let clock = Arc::new(ManualClock::from_now());
    let transport = Arc::new(MockTransport::default());
    let recorder = Arc::new(MemoryRecorder::new());
    let gateway = RequestGateway::new(
        "acct-1",
        config,
        transport.clone(),
        recorder.clone(),
        clock.clone(),
    );
    Harness {
        clock,
        transport,
        recorder,
        gateway,
    }
}

mod pause_enforcement {
    use super::*;

    #[tokio::test]
    async fn test_active_pause_short_circuits() {
        let h = harness(fast_config());
        h.transport.push(status(429));
        h.transport.push(status(429));
        h.transport.push(status(429));

        // First call observes the 429s and creates a pause.
        let resp = h
            .gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(!resp.ok);
        let calls_after_first = h.transport.call_count();
        assert_eq!(calls_after_first, 3);

        // Within the pause window: no network call at all.
        h.clock.advance(ChronoDuration::seconds(10));
        let resp = h
            .gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert_eq!(h.transport.call_count(), calls_after_first);
        assert_eq!(resp.status, 429);
        match resp.reason {
            Some(FailureReason::PauseActive { pause_reason, .. }) => {
                assert_eq!(pause_reason, "rate_limited")
            }
            other => panic!("expected PauseActive, got {other:?}"),
        }

        // The short-circuit still produced a call record.
        assert!(h.recorder.len() > calls_after_first);
    }

    #[tokio::test]
    async fn test_pause_expiry_allows_call() {
        let mut config = fast_config();
        config.pause_rate_limited_secs = 30;
        let h = harness(config);

        // One 429 (all three attempts), creating a 30s pause.
        h.transport.push(status(429));
        h.transport.push(status(429));
        h.transport.push(status(429));
        h.gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        let calls = h.transport.call_count();

        // +10s: short-circuited.
        h.clock.advance(ChronoDuration::seconds(10));
        h.gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert_eq!(h.transport.call_count(), calls);

        // +31s total: attempted normally.
        h.clock.advance(ChronoDuration::seconds(21));
        h.transport.push(status(200));
        let resp = h
            .gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(resp.ok);
        assert_eq!(h.transport.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_pause_is_target_scoped() {
        let mut config = fast_config();
        config.pause_rate_limited_secs = 60;
        let h = harness(config);

        h.transport.push(status(429));
        h.transport.push(status(429));
        h.transport.push(status(429));
        h.gateway
            .execute(Some("t-1"), ApiRequest::get(Endpoint::ReelLookup))
            .await;
        let calls = h.transport.call_count();

        // Different target: not blocked.
        h.transport.push(status(200));
        let resp = h
            .gateway
            .execute(Some("t-2"), ApiRequest::get(Endpoint::ReelLookup))
            .await;
        assert!(resp.ok);
        assert_eq!(h.transport.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_retry_after_header_sets_pause_window() {
        let h = harness(fast_config());
        h.transport.push(status_with_retry_after(429, 7));
        h.transport.push(status(200));
        h.gateway
            .execute(Some("t-9"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        let calls = h.transport.call_count();

        // The retry succeeded, but the header left a 7s pause behind.
        h.clock.advance(ChronoDuration::seconds(5));
        let resp = h
            .gateway
            .execute(Some("t-9"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(!resp.ok);
        assert_eq!(h.transport.call_count(), calls);

        // Past the window the endpoint is reachable again.
        h.clock.advance(ChronoDuration::seconds(3));
        h.transport.push(status(200));
        let resp = h
            .gateway
            .execute(Some("t-9"), ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(resp.ok);
        assert_eq!(h.transport.call_count(), calls + 1);
    }
}

mod retry_behavior {
    use super::*;

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let h = harness(fast_config());
        h.transport.push(status(500));
        h.transport.push(status(503));
        h.transport.push(status(200));

        let resp = h
            .gateway
            .execute(None, ApiRequest::get(Endpoint::ProfileInfo))
            .await;
        assert!(resp.ok);
        assert_eq!(h.transport.call_count(), 3);
        // Every attempt was recorded.
        assert_eq!(h.recorder.len(), 3);
    }

    #[tokio::test]
    async fn test_network_error_is_retryable() {
        let h = harness(fast_config());
        h.transport
            .push_err(StrandError::TransientNetwork("connection reset".into()));
        h.transport.push(status(200));

        let resp = h
            .gateway
            .execute(None, ApiRequest::get(Endpoint::ProfileInfo))
            .await;
        assert!(resp.ok);
        assert_eq!(h.transport.call_count(), 2);
        // The failed attempt was recorded with status 0.
        assert_eq!(h.recorder.records()[0].status, 0);
    }

    #[tokio::test]
    async fn test_definitive_failure_does_not_retry() {
        let h = harness(fast_config());
        h.transport.push(status(404));

        let resp = h
            .gateway
            .execute(None, ApiRequest::get(Endpoint::ProfileInfo))
            .await;
        assert!(!resp.ok);
        assert_eq!(resp.status, 404);
        assert_eq!(h.transport.call_count(), 1);
        assert!(matches!(
            resp.reason,
            Some(FailureReason::Upstream { status: 404 })
        ));
    }

    #[tokio::test]
    async fn test_auth_expired_aborts_immediately() {
        let h = harness(fast_config());
        h.transport.push(status(401));

        let resp = h
            .gateway
            .execute(None, ApiRequest::get(Endpoint::InboxThreads))
            .await;
        assert!(!resp.ok);
        assert_eq!(resp.reason, Some(FailureReason::AuthExpired));
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let h = harness(fast_config());
        h.transport.push(status(500));
        h.transport.push(status(500));
        h.transport.push(status(500));

        let resp = h
            .gateway
            .execute(None, ApiRequest::get(Endpoint::ProfileInfo))
            .await;
        assert!(!resp.ok);
        assert_eq!(
            resp.reason,
            Some(FailureReason::Exhausted {
                attempts: 3,
                last_status: 500
            })
        );
    }
}

mod escalation {
    use super::*;

    #[tokio::test]
    async fn test_browser_fallback_after_exhaustion() {
        let h = harness(fast_config());
        h.transport.push(status(500));
        h.transport.push(status(500));
        h.transport.push(status(500));

        let escalation = Arc::new(MockEscalation::returning(ApiResponse {
            status: 200,
            headers: HashMap::new(),
            body: Some(serde_json::json!({"items": []})),
        }));
        let gateway = RequestGateway::new(
            "acct-1",
            fast_config(),
            h.transport.clone(),
            h.recorder.clone(),
            h.clock.clone(),
        )
        .with_escalation(escalation.clone());

        let resp = gateway
            .execute(None, ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(resp.ok);
        assert!(resp.via_browser);
        assert_eq!(escalation.call_count(), 1);
    }

    #[tokio::test]
    async fn test_escalation_not_used_on_direct_success() {
        let h = harness(fast_config());
        h.transport.push(status(200));

        let escalation = Arc::new(MockEscalation::returning(status(200)));
        let gateway = RequestGateway::new(
            "acct-1",
            fast_config(),
            h.transport.clone(),
            h.recorder.clone(),
            h.clock.clone(),
        )
        .with_escalation(escalation.clone());

        let resp = gateway
            .execute(None, ApiRequest::get(Endpoint::FeedTimeline))
            .await;
        assert!(resp.ok);
        assert!(!resp.via_browser);
        assert_eq!(escalation.call_count(), 0);
    }
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn test_post_carries_stable_client_context() {
        let h = harness(fast_config());
        h.transport.push(status(500));
        h.transport.push(status(200));

        let req = ApiRequest::post(Endpoint::MessageSend)
            .with_form("action", "send_item")
            .with_form("text", "hello");
        let resp = h.gateway.execute(Some("t-1"), req).await;
        assert!(resp.ok);

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 2);
        let first = calls[0].form_value("client_context").unwrap().to_string();
        let second = calls[1].form_value("client_context").unwrap().to_string();
        // The retry reused the same idempotency token.
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
