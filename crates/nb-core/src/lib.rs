//! nb-core: shared types, IDs, errors, configuration and time source.
//!
//! This crate is the foundational dependency for all other nb-* crates,
//! providing the typed job identifier, the unified error taxonomy, the
//! application configuration and the [`clock::Clock`] used for artifact
//! expiry.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use ids::*;
pub use job::JobStatus;
