//! Retry policy as pure functions, so the delay arithmetic is testable
//! without a gateway or a clock.

use rand::RngExt;
use std::collections::HashMap;
use std::time::Duration;

use strand_config::GatewayConfig;

/// Transient failures worth retrying: 429, any 5xx, or no response at all.
pub fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500 || status == 0
}

/// Delay before the next attempt.
///
/// A `Retry-After` value always wins. Otherwise exponential backoff with
/// jitter, using a higher base for 429 than for other retryable statuses,
/// capped at `max_delay_ms`.
pub fn retry_delay(
    config: &GatewayConfig,
    status: u16,
    attempt: u32,
    retry_after_secs: Option<u64>,
) -> Duration {
    if let Some(secs) = retry_after_secs {
        return Duration::from_secs(secs);
    }

    let base = if status == 429 {
        config.rate_limit_base_delay_ms
    } else {
        config.base_delay_ms
    };

    let jitter = if config.jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=config.jitter_ms)
    };

    let exp = base.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(exp.saturating_add(jitter).min(config.max_delay_ms))
}

/// Parse a Retry-After header (seconds form only; the platform does not send
/// HTTP dates here).
pub fn parse_retry_after(headers: &HashMap<String, String>) -> Option<u64> {
    headers.get("retry-after")?.trim().parse().ok()
}
