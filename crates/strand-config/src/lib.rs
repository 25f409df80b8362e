//! # strand-config
//!
//! TOML configuration for the Strand engine. Every empirically tuned policy
//! constant — backoff bases, endpoint spacing, pause TTLs, retry-after
//! windows — lives here rather than at a call site, so the numbers stay
//! visible and adjustable.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::*;
