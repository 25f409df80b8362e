//! # strand-core
//!
//! Core types, traits, and primitives for the Strand extraction-and-delivery
//! engine. This crate defines the shared vocabulary used by every other crate
//! in the workspace: the error taxonomy, capability and channel enums, the
//! composite item key used for deduplication, outcome/exit vocabulary for
//! workflow runs, and the injectable clock.

pub mod clock;
pub mod error;
pub mod outcome;
pub mod record;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, StrandError};
pub use outcome::{ExitReason, Outcome, SkipReason, WorkflowStats};
pub use record::{CallRecorder, EndpointCallRecord, MemoryRecorder, NullRecorder};
pub use types::*;
