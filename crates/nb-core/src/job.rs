//! Job lifecycle states.
//!
//! Serializes in lowercase and implements `Display`/`FromStr` so the same
//! strings are used in SQL, JSON and logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persisted state of a conversion job.
///
/// `Processing` is the only initial state; the other two are terminal and a
/// job reaches at most one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::Validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}
