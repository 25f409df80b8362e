use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backoff::{is_retryable, parse_retry_after, retry_delay};
use crate::escalate::BrowserEscalation;
use crate::pacing::SpacingStore;
use crate::pause::{PauseKey, PauseStore};
use crate::transport::Transport;
use crate::types::{ApiRequest, ApiResponse, FailureReason, GatewayResponse, Method};
use strand_config::GatewayConfig;
use strand_core::{AccountId, CallRecorder, Clock, EndpointCallRecord};

/// Executes outbound calls with pacing, pause enforcement, retry with
/// backoff, and optional in-browser escalation.
///
/// One gateway serves one account; the single-worker-per-account rule means
/// `execute` is never raced for the same account.
pub struct RequestGateway {
    account: AccountId,
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    escalation: Option<Arc<dyn BrowserEscalation>>,
    pauses: Arc<PauseStore>,
    spacing: Arc<SpacingStore>,
    recorder: Arc<dyn CallRecorder>,
    clock: Arc<dyn Clock>,
}

impl RequestGateway {
    pub fn new(
        account: impl Into<AccountId>,
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        recorder: Arc<dyn CallRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pauses = Arc::new(PauseStore::new(clock.clone()));
        let spacing = Arc::new(SpacingStore::new(clock.clone()));
        Self {
            account: account.into(),
            config,
            transport,
            escalation: None,
            pauses,
            spacing,
            recorder,
            clock,
        }
    }

    /// Attach the in-browser fallback used after direct attempts exhaust.
    pub fn with_escalation(mut self, escalation: Arc<dyn BrowserEscalation>) -> Self {
        self.escalation = Some(escalation);
        self
    }

    /// Shared pause store (read by diagnostics, written only here).
    pub fn pauses(&self) -> Arc<PauseStore> {
        Arc::clone(&self.pauses)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The clock the gateway schedules against.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Execute one logical request. Never returns `Err` for upstream
    /// conditions — every failure is a structured response with a reason.
    pub async fn execute(
        &self,
        target_key: Option<&str>,
        mut request: ApiRequest,
    ) -> GatewayResponse {
        let endpoint = request.endpoint;
        let pause_key = PauseKey::new(self.account.clone(), endpoint, target_key);

        // Pause check: an unexpired pause short-circuits without a call.
        if let Some(pause) = self.pauses.active(&pause_key) {
            let unblock_in = (pause.unblock_at - self.clock.now()).num_seconds();
            debug!(
                account = %self.account,
                endpoint = %endpoint,
                target = ?target_key,
                unblock_in_secs = unblock_in,
                "rate-limit pause active — short-circuiting"
            );
            self.record(endpoint.name(), request.method, 429);
            return GatewayResponse::failure(
                429,
                FailureReason::PauseActive {
                    pause_reason: pause.reason,
                    unblock_in_secs: unblock_in,
                },
            );
        }

        // Posts carry one client context token for the whole logical request,
        // so retries and the browser escalation repeat the same send.
        if request.method == Method::Post && request.form_value("client_context").is_none() {
            request = request.with_form("client_context", Uuid::new_v4().to_string());
        }

        // Pacing: honor the spacing mark, but never sleep past the cap.
        let wait = self.spacing.wait_needed(&self.account, endpoint);
        if !wait.is_zero() {
            let capped = wait.min(Duration::from_millis(self.config.pacing_cap_ms));
            debug!(endpoint = %endpoint, wait_ms = capped.as_millis() as u64, "pacing sleep");
            tokio::time::sleep(capped).await;
        }

        let mut last_status = 0u16;
        for attempt in 0..self.config.max_attempts {
            let response = match self.transport.send(&request).await {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(endpoint = %endpoint, attempt, error = %e, "transport error");
                    ApiResponse::default() // status 0: no response
                }
            };
            self.spacing.mark(&self.account, endpoint, &self.config);
            self.record(endpoint.name(), request.method, response.status);
            last_status = response.status;

            if Self::auth_expired(&response) {
                warn!(account = %self.account, endpoint = %endpoint, "session authentication expired");
                return GatewayResponse::failure(response.status, FailureReason::AuthExpired);
            }

            if response.is_success() {
                return GatewayResponse::success(response, false);
            }

            let retry_after = parse_retry_after(&response.headers);

            // 429 and server errors refresh the pause for this key.
            if response.status == 429 || response.status >= 500 {
                let (default_secs, reason) = if response.status == 429 {
                    (self.config.pause_rate_limited_secs, "rate_limited")
                } else {
                    (self.config.pause_server_error_secs, "server_error")
                };
                let secs = retry_after.unwrap_or(default_secs);
                let rl_headers = response
                    .headers
                    .iter()
                    .filter(|(k, _)| k.starts_with("x-ratelimit") || k.as_str() == "retry-after")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if let Err(e) =
                    self.pauses
                        .pause_for(pause_key.clone(), secs, reason, rl_headers)
                {
                    warn!(error = %e, "failed to record rate-limit pause");
                }
            }

            if !is_retryable(response.status) {
                debug!(endpoint = %endpoint, status = response.status, "definitive upstream failure");
                return GatewayResponse {
                    ok: false,
                    status: response.status,
                    payload: response.body,
                    headers: response.headers,
                    reason: Some(FailureReason::Upstream {
                        status: response.status,
                    }),
                    via_browser: false,
                };
            }

            if attempt + 1 < self.config.max_attempts {
                let delay = retry_delay(&self.config, response.status, attempt, retry_after);
                debug!(
                    endpoint = %endpoint,
                    attempt,
                    status = response.status,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }

        // Direct attempts exhausted — same logical request through the
        // browser's script context, if available.
        if let Some(escalation) = &self.escalation {
            match escalation.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    info!(endpoint = %endpoint, "in-page fetch succeeded after direct exhaustion");
                    self.record(endpoint.name(), request.method, response.status);
                    return GatewayResponse::success(response, true);
                }
                Ok(response) => {
                    self.record(endpoint.name(), request.method, response.status);
                    last_status = response.status;
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "in-page fetch escalation failed");
                }
            }
        }

        GatewayResponse::failure(
            last_status,
            FailureReason::Exhausted {
                attempts: self.config.max_attempts,
                last_status,
            },
        )
    }

    fn record(&self, endpoint: &str, method: Method, status: u16) {
        self.recorder.record_call(EndpointCallRecord {
            account_id: self.account.clone(),
            endpoint: endpoint.to_string(),
            method: method.as_str().to_string(),
            status,
            at: self.clock.now(),
        });
    }

    /// 401 always; some deployments answer 403 with a login_required body.
    fn auth_expired(response: &ApiResponse) -> bool {
        if response.status == 401 {
            return true;
        }
        if response.status == 403
            && let Some(body) = &response.body
            && let Some(message) = body_message(body)
        {
            return message == "login_required" || message == "challenge_required";
        }
        false
    }
}

fn body_message(body: &Value) -> Option<&str> {
    body.get("message").and_then(|m| m.as_str())
}
