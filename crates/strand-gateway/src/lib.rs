//! # strand-gateway
//!
//! The request-execution layer. Every outbound call against the platform's
//! private API goes through [`RequestGateway::execute`], which enforces
//! per-endpoint pacing, honors local rate-limit pauses, retries transient
//! failures with exponential backoff, and escalates to an in-browser fetch
//! when direct attempts are exhausted.
//!
//! The gateway never raises for upstream failures — callers always get a
//! structured [`GatewayResponse`] with a typed reason.

mod backoff;
mod escalate;
mod gateway;
mod pacing;
mod pause;
mod transport;
mod types;

pub use backoff::{is_retryable, parse_retry_after, retry_delay};
pub use escalate::{BrowserEscalation, ScriptFetch};
pub use gateway::RequestGateway;
pub use pacing::SpacingStore;
pub use pause::{PauseKey, PauseStore, RateLimitPause};
pub use transport::{HttpTransport, SessionHeaders, Transport};
pub use types::{ApiRequest, ApiResponse, Endpoint, EndpointClass, FailureReason, GatewayResponse, Method};
