//! Result records returned to callers.
//!
//! `ResultSummary` is a best-effort projection of artillery's own result
//! JSON; it is derived, not authoritative. `ExecutionResult` is the record
//! every run operation resolves to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Response-time percentiles in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Aggregate statistics extracted from an artillery result file.
///
/// Every field degrades to zero / empty when the source JSON does not carry
/// it; extraction itself never fails on shape drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Total HTTP requests issued over the run.
    pub requests_total: u64,

    /// Mean request rate over the run (requests per second).
    pub rps_avg: f64,

    /// Response-time percentiles.
    pub latency: LatencySummary,

    /// Error-kind label to occurrence count.
    pub errors: BTreeMap<String, u64>,
}

impl ResultSummary {
    /// True when nothing was extracted (all-default projection).
    pub fn is_empty(&self) -> bool {
        *self == ResultSummary::default()
    }
}

/// Outcome of a completed (or validated) test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Subprocess exit code; `0` for validate-only short-circuits.
    pub exit_code: i32,

    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,

    /// Bounded tail of captured stdout+stderr (last 2 KiB).
    pub logs: String,

    /// Path to the JSON result file, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_json: Option<PathBuf>,

    /// Path to the HTML report, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_html: Option<PathBuf>,

    /// Aggregate summary, when a result file was produced and parseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResultSummary>,
}
