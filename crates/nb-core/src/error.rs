//! Unified error type for the conversion service.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].
//! The conversion variants double as the message stored on a failed job, so
//! their `Display` output is part of the API contract.

use std::fmt;

/// Unified error type covering all failure modes in the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An artifact record exists but its file is gone from disk.
    #[error("File not found - conversion may have failed: {id}")]
    FileMissing {
        /// Job whose artifact file is missing.
        id: String,
    },

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job", "artifact").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The artifact exists but its download window has passed.
    #[error("File expired: {id}")]
    Expired {
        /// Job whose artifact expired.
        id: String,
    },

    /// No route exists for the (source extension, target format) pair.
    #[error("Unsupported conversion: {extension} -> {target}")]
    Unsupported {
        /// Lowercased source extension (may be empty).
        extension: String,
        /// Requested target format.
        target: String,
    },

    /// The pair is routable but the backing capability is disabled.
    #[error("Capability unavailable: {capability} conversion is disabled ({reason})")]
    CapabilityUnavailable {
        /// Capability name, e.g. "video".
        capability: String,
        /// Why the capability is disabled (missing tool, config).
        reason: String,
    },

    /// The converter returned without producing the output file.
    #[error("Conversion failed - output file not created: {path}")]
    OutputMissing {
        /// Expected output location.
        path: String,
    },

    /// The converter itself reported an error.
    #[error("{capability} conversion failed: {message}")]
    ConversionFailed {
        /// Capability that was running.
        capability: String,
        /// Error reported by the backend.
        message: String,
    },

    /// The conversion exceeded the per-job time limit.
    #[error("Conversion timed out after {secs}s")]
    Timeout {
        /// Configured limit in seconds.
        secs: u64,
    },

    /// The bounded work queue cannot take another job.
    #[error("Conversion queue is full ({capacity} pending jobs); retry later")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// The upload exceeds the configured size limit.
    #[error("Upload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller exceeded its request quota.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, soffice) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::FileMissing { .. } => 404,
            Error::Expired { .. } => 410,
            Error::Unsupported { .. } => 422,
            Error::CapabilityUnavailable { .. } => 503,
            Error::OutputMissing { .. } => 500,
            Error::ConversionFailed { .. } => 500,
            Error::Timeout { .. } => 504,
            Error::QueueFull { .. } => 503,
            Error::PayloadTooLarge { .. } => 413,
            Error::Unauthorized(_) => 401,
            Error::RateLimited(_) => 429,
            Error::Validation(_) => 400,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::FileMissing { .. } => "file_missing",
            Error::Expired { .. } => "expired",
            Error::Unsupported { .. } => "unsupported",
            Error::CapabilityUnavailable { .. } => "capability_unavailable",
            Error::OutputMissing { .. } => "output_missing",
            Error::ConversionFailed { .. } => "conversion_failed",
            Error::Timeout { .. } => "timeout",
            Error::QueueFull { .. } => "queue_full",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::Unauthorized(_) => "unauthorized",
            Error::RateLimited(_) => "rate_limited",
            Error::Validation(_) => "validation_error",
            Error::Database { .. } => "database_error",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Unsupported`].
    pub fn unsupported(extension: impl Into<String>, target: impl Into<String>) -> Self {
        Error::Unsupported {
            extension: extension.into(),
            target: target.into(),
        }
    }

    /// Convenience constructor for [`Error::ConversionFailed`].
    pub fn conversion(capability: impl fmt::Display, message: impl fmt::Display) -> Self {
        Error::ConversionFailed {
            capability: capability.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
