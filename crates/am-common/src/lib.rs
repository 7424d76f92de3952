//! Artillery MCP common types and errors.
//!
//! This crate provides foundational types shared across am-core modules:
//! - Common error types with stable codes
//! - Result summary and execution result records
//! - Output format specifications
//! - Wire schema versioning

pub mod error;
pub mod output;
pub mod report;

pub use error::{Error, ErrorCategory, ErrorRecord, Result};
pub use output::OutputFormat;
pub use report::{ExecutionResult, LatencySummary, ResultSummary};

/// Version of the wire-level result schema emitted by tools and the CLI.
pub const SCHEMA_VERSION: &str = "1.0";
