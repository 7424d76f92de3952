//! Error types for the artillery adapter.
//!
//! This module provides structured error handling with:
//! - Stable numeric codes for machine parsing
//! - Category classification for error grouping
//! - Wire-level code strings matching the tool result contract
//!
//! # Agent-Facing Output
//!
//! Errors serialize to a structured record:
//! ```json
//! {
//!   "code": "EXECUTION_ERROR",
//!   "message": "test run timed out after 30000ms",
//!   "details": { "numeric_code": 31 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Startup configuration errors (binary path, work dir, limits).
    Config,
    /// Per-call validation errors the caller can fix.
    Validation,
    /// Subprocess spawn and timeout errors.
    Execution,
    /// Result-file parsing errors.
    Parse,
    /// Capability-reporting errors.
    Capabilities,
    /// File I/O and serialization errors.
    Io,
    /// Unexpected faults caught at the call boundary.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Capabilities => write!(f, "capabilities"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Unified error type for the artillery adapter.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("artillery binary not found: {0}")]
    BinaryNotFound(String),

    // Validation errors (20-29)
    #[error("path escapes work directory: {path}")]
    PathEscape { path: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("quick test capability is disabled")]
    QuickDisabled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Execution errors (30-39)
    #[error("failed to spawn artillery: {0}")]
    Spawn(String),

    #[error("test run timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("execution failed: {0}")]
    Execution(String),

    // Parse errors (40-49)
    #[error("result file unreadable: {0}")]
    ResultUnreadable(String),

    #[error("result file is not valid JSON: {0}")]
    ResultParse(String),

    // Capabilities errors (50-59)
    #[error("capability report failed: {0}")]
    Capabilities(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors (70-79)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the numeric code for this error type.
    ///
    /// Codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Validation errors
    /// - 30-39: Execution errors
    /// - 40-49: Parse errors
    /// - 50-59: Capabilities errors
    /// - 60-69: I/O errors
    /// - 70-79: Internal errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::BinaryNotFound(_) => 11,
            Error::PathEscape { .. } => 20,
            Error::FileNotFound { .. } => 21,
            Error::QuickDisabled => 22,
            Error::InvalidArgument(_) => 23,
            Error::Spawn(_) => 30,
            Error::Timeout { .. } => 31,
            Error::Execution(_) => 32,
            Error::ResultUnreadable(_) => 40,
            Error::ResultParse(_) => 41,
            Error::Capabilities(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Internal(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::BinaryNotFound(_) => ErrorCategory::Config,

            Error::PathEscape { .. }
            | Error::FileNotFound { .. }
            | Error::QuickDisabled
            | Error::InvalidArgument(_) => ErrorCategory::Validation,

            Error::Spawn(_) | Error::Timeout { .. } | Error::Execution(_) => {
                ErrorCategory::Execution
            }

            Error::ResultUnreadable(_) | Error::ResultParse(_) => ErrorCategory::Parse,

            Error::Capabilities(_) => ErrorCategory::Capabilities,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Wire-level code string used in tool error results.
    ///
    /// These are a stable contract for MCP clients.
    pub fn wire_code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Config => "CONFIG_ERROR",
            ErrorCategory::Validation => "VALIDATION_ERROR",
            ErrorCategory::Execution => "EXECUTION_ERROR",
            ErrorCategory::Parse => "PARSE_ERROR",
            ErrorCategory::Capabilities => "CAPABILITIES_ERROR",
            ErrorCategory::Io => "EXECUTION_ERROR",
            ErrorCategory::Internal => "INTERNAL_ERROR",
        }
    }

    /// Convert into the structured record sent back over the wire.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.wire_code().to_string(),
            message: self.to_string(),
            details: serde_json::json!({
                "numeric_code": self.code(),
                "category": self.category().to_string(),
            }),
        }
    }
}

/// Structured error record for the uniform tool outcome shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}
