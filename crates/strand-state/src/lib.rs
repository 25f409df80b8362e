//! # strand-state
//!
//! Durable per-target interaction state and the engine's local logs, in a
//! single SQLite database. Capability records answer "may we contact this
//! target over this channel right now"; cursors remember stream positions;
//! the call and outcome logs keep an auditable trail of what the engine did.
//!
//! No capability state is terminal. `Unavailable` always carries a strictly
//! future re-check time and means "not before then", never "never again".

mod cursor;
mod interaction;
mod outcome;
mod store;

pub use interaction::{Gate, InteractionRecord};
pub use outcome::ContentRecord;
pub use store::StateStore;
