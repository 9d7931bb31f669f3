//! Database query modules.

pub mod artifacts;
pub mod jobs;
