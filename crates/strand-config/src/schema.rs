use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `strand.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandConfig {
    pub account: AccountConfig,
    pub gateway: GatewayConfig,
    pub policy: PolicyConfig,
    pub navigation: NavigationConfig,
    pub scheduler: SchedulerConfig,
    pub driver: DriverConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

// ── Account / session ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Platform identifier of the managed account.
    pub account_id: String,
    /// Base URL of the private API surface.
    pub api_base: String,
    /// Session cookie value. Usually injected via `STRAND_SESSION_COOKIE`.
    pub session_cookie: String,
    /// App-identifier header value.
    pub app_id: String,
    /// CSRF token. Usually injected via `STRAND_CSRF_TOKEN`.
    pub csrf_token: String,
    /// Optional platform "claim" header, rotated by the upstream.
    pub claim: Option<String>,
    /// Owners considered in-scope for interaction (known relationships).
    /// Empty means every resolvable owner is in scope.
    pub scope: Vec<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_base: "https://i.example-platform.com/api/v1".into(),
            session_cookie: String::new(),
            app_id: String::new(),
            csrf_token: String::new(),
            claim: None,
            scope: Vec::new(),
        }
    }
}

// ── Gateway ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Maximum direct-call attempts before escalating to the browser.
    pub max_attempts: u32,
    /// Base backoff delay for retryable non-429 failures.
    pub base_delay_ms: u64,
    /// Base backoff delay when the platform answered 429.
    pub rate_limit_base_delay_ms: u64,
    /// Ceiling for any computed backoff delay.
    pub max_delay_ms: u64,
    /// Random jitter added to each backoff delay, 0..=this.
    pub jitter_ms: u64,
    /// Longest the gateway will sleep to honor a spacing mark.
    pub pacing_cap_ms: u64,
    /// Minimum inter-request interval for generic read endpoints.
    pub spacing_read_ms: u64,
    /// Minimum inter-request interval for inbox-like endpoints.
    pub spacing_inbox_ms: u64,
    /// Minimum inter-request interval for write/send endpoints.
    pub spacing_write_ms: u64,
    /// Pause window after a 429 without a Retry-After header.
    pub pause_rate_limited_secs: u64,
    /// Pause window after a 5xx without a Retry-After header.
    pub pause_server_error_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            rate_limit_base_delay_ms: 5_000,
            max_delay_ms: 60_000,
            jitter_ms: 250,
            pacing_cap_ms: 1_200,
            spacing_read_ms: 800,
            spacing_inbox_ms: 2_500,
            spacing_write_ms: 1_500,
            pause_rate_limited_secs: 300,
            pause_server_error_secs: 60,
        }
    }
}

// ── Retry-after policy ─────────────────────────────────────────

/// Cooldown windows applied by callers when marking a target unavailable.
///
/// These are empirically tuned values carried over from production use, not
/// derived constants — candidates for future tuning. The long 403 window
/// reflects that a 403 on a definitive send indicates a durable
/// platform-level restriction, while other failures are usually transient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Window after an HTTP 403 on a definitive send.
    pub forbidden_retry_window_secs: u64,
    /// Window after a generic API failure or unresolved identity.
    pub transient_retry_window_secs: u64,
    /// How long a recorded capability probe stays fresh (no re-probe).
    pub capability_freshness_secs: u64,
    /// How many recent outcomes the duplicate-response check scans.
    pub duplicate_window: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_retry_window_secs: 72 * 3600,
            transient_retry_window_secs: 6 * 3600,
            capability_freshness_secs: 3600,
            duplicate_window: 200,
        }
    }
}

// ── Navigation ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Total iterations allowed per run = limit * this multiplier.
    pub safety_multiplier: u32,
    /// Recovery attempts when an advance produces no movement.
    pub advance_retries: u32,
    /// Page bound for feed pagination.
    pub max_pages: u32,
    /// Settle delay after an advance before reading the new item.
    pub settle_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            safety_multiplier: 5,
            advance_retries: 2,
            max_pages: 20,
            settle_ms: 400,
        }
    }
}

// ── Scheduler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub story_sync_secs: u64,
    pub feed_sync_secs: u64,
    pub capability_scan_secs: u64,
    /// Fraction of the interval added as random jitter (0.0 - 1.0).
    pub jitter_frac: f64,
    /// Hard deadline for one workflow invocation. The daemon abandons runs
    /// that exceed it; the browser session is still released.
    pub workflow_deadline_secs: u64,
    /// Optional cron expression overriding the story-sync interval.
    pub story_sync_cron: Option<String>,
    /// Optional cron expression overriding the feed-sync interval.
    pub feed_sync_cron: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            story_sync_secs: 15 * 60,
            feed_sync_secs: 30 * 60,
            capability_scan_secs: 6 * 3600,
            jitter_frac: 0.15,
            workflow_deadline_secs: 30 * 60,
            story_sync_cron: None,
            feed_sync_cron: None,
        }
    }
}

// ── Driver ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Chrome DevTools port on localhost.
    pub cdp_port: u16,
    pub nav_timeout_secs: u64,
    pub script_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            cdp_port: 9222,
            nav_timeout_secs: 30,
            script_timeout_secs: 15,
        }
    }
}

// ── Storage / logging ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database. None resolves to ~/.strand/strand.db.
    pub db_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "strand=debug,info".
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

impl StrandConfig {
    /// Validate the configuration. Returns warnings for soft issues and an
    /// error string for hard misconfiguration.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.gateway.max_attempts == 0 {
            return Err("gateway.max_attempts must be at least 1".into());
        }
        if self.navigation.safety_multiplier == 0 {
            return Err("navigation.safety_multiplier must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.scheduler.jitter_frac) {
            return Err(format!(
                "scheduler.jitter_frac must be within 0.0..=1.0, got {}",
                self.scheduler.jitter_frac
            ));
        }
        if self.gateway.base_delay_ms > self.gateway.max_delay_ms {
            return Err("gateway.base_delay_ms exceeds gateway.max_delay_ms".into());
        }
        if self.scheduler.workflow_deadline_secs == 0 {
            return Err("scheduler.workflow_deadline_secs must be at least 1".into());
        }

        if self.account.account_id.is_empty() {
            warnings.push("account.account_id is empty — workflows cannot run".into());
        }
        if self.account.session_cookie.is_empty() {
            warnings.push(
                "account.session_cookie is empty — set STRAND_SESSION_COOKIE or the config key"
                    .into(),
            );
        }
        if self.policy.forbidden_retry_window_secs < self.policy.transient_retry_window_secs {
            warnings.push(
                "policy.forbidden_retry_window_secs is shorter than the transient window — \
                 403 responses normally indicate a durable restriction"
                    .into(),
            );
        }
        if self.gateway.pacing_cap_ms > 2_000 {
            warnings.push(format!(
                "gateway.pacing_cap_ms = {} is unusually high; pacing sleeps block the worker",
                self.gateway.pacing_cap_ms
            ));
        }

        Ok(warnings)
    }
}
