use thiserror::Error;

/// Unified error type for the Strand engine.
///
/// Upstream-call failures are *not* errors at the gateway boundary — the
/// gateway reports them as structured responses. This enum covers the
/// conditions that propagate between components.
#[derive(Error, Debug)]
pub enum StrandError {
    // ── Request / platform errors ──────────────────────────────
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("session authentication expired: {0}")]
    AuthExpired(String),

    #[error("malformed upstream payload: {0}")]
    ParseFailure(String),

    // ── Browser driver errors ──────────────────────────────────
    #[error("browser session disconnected: {0}")]
    SessionDisconnected(String),

    #[error("driver action failed: {action}: {reason}")]
    Driver { action: String, reason: String },

    // ── Resolution errors ──────────────────────────────────────
    #[error("no strategy produced a valid result: {}", reasons.join("; "))]
    Unresolved { reasons: Vec<String> },

    // ── State store errors ─────────────────────────────────────
    #[error("state store error: {0}")]
    State(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StrandError {
    /// Whether this error should abort an entire workflow invocation rather
    /// than being recorded against the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StrandError::AuthExpired(_))
    }
}

pub type Result<T> = std::result::Result<T, StrandError>;
