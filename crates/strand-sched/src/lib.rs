//! # strand-sched
//!
//! Decides *when* workflows run; never *what* they do. A [`Coordinator`]
//! answers "is this workflow due for this account", accepts the next fire
//! time after a run, and reports overall health. [`IntervalCoordinator`]
//! implements it with per-workflow intervals (or cron expressions) plus
//! random jitter so multiple accounts never fall into lockstep.

mod coordinator;

pub use coordinator::{Coordinator, IntervalCoordinator, WorkflowKind};
