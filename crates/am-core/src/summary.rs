//! Artillery result-file parsing and summarization.
//!
//! Artillery's JSON report schema is not stable across its own versions, so
//! extraction runs a fixed-preference list of schema projections. A field a
//! shape does not carry degrades to zero / empty; only an unreadable or
//! syntactically invalid file is an error.

use am_common::{LatencySummary, ResultSummary};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Result-file failures. These cover the file itself, never its shape.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("cannot read result file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("result file {path} is not valid JSON: {reason}")]
    Parse { path: String, reason: String },
}

impl From<SummaryError> for am_common::Error {
    fn from(e: SummaryError) -> Self {
        match e {
            SummaryError::Unreadable { path, reason } => {
                am_common::Error::ResultUnreadable(format!("{path}: {reason}"))
            }
            SummaryError::Parse { path, reason } => {
                am_common::Error::ResultParse(format!("{path}: {reason}"))
            }
        }
    }
}

/// Parse a result file and return the full JSON value unmodified.
///
/// This is the raw pass-through for callers that want artillery's own data;
/// [`summarize`] is the projection layered on top of it.
pub fn parse_results(path: &Path) -> Result<Value, SummaryError> {
    let text = std::fs::read_to_string(path).map_err(|e| SummaryError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| SummaryError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Known result schema shapes, tried in preference order.
const PROJECTIONS: &[(&str, fn(&Value) -> Option<ResultSummary>)] = &[
    ("metrics.http", project_metrics_http),
    ("aggregate", project_aggregate),
];

/// Extract the aggregate summary from a result file.
///
/// Deterministic for an unchanged file; unknown shapes produce the all-zero
/// default rather than failing.
pub fn summarize(path: &Path) -> Result<ResultSummary, SummaryError> {
    let root = parse_results(path)?;
    for (name, project) in PROJECTIONS {
        if let Some(summary) = project(&root) {
            debug!(shape = name, "matched result schema");
            return Ok(summary);
        }
    }
    debug!("no known result schema matched, returning defaults");
    Ok(ResultSummary::default())
}

/// Newer layout: `metrics.http.{requests,response_time,errors}`.
fn project_metrics_http(root: &Value) -> Option<ResultSummary> {
    let http = root.get("metrics")?.get("http")?;
    let requests = http.get("requests");
    let response_time = http.get("response_time");
    Some(ResultSummary {
        requests_total: field_u64(requests, "count"),
        rps_avg: field_f64(requests, "rate"),
        latency: LatencySummary {
            p50: field_f64(response_time, "p50"),
            p95: field_f64(response_time, "p95"),
            p99: field_f64(response_time, "p99"),
        },
        errors: object_counts(http.get("errors")),
    })
}

/// Older layout: `aggregate.{counters,rates,summaries}` with dotted keys;
/// error kinds live in `counters` under an `errors.` prefix.
fn project_aggregate(root: &Value) -> Option<ResultSummary> {
    let aggregate = root.get("aggregate")?;
    let counters = aggregate.get("counters");
    let rates = aggregate.get("rates");
    let response_time = aggregate
        .get("summaries")
        .and_then(|s| s.get("http.response_time"));

    let mut errors = BTreeMap::new();
    if let Some(map) = counters.and_then(Value::as_object) {
        for (key, value) in map {
            if let Some(kind) = key.strip_prefix("errors.") {
                errors.insert(kind.to_string(), count_of(value));
            }
        }
    }

    Some(ResultSummary {
        requests_total: field_u64(counters, "http.requests"),
        rps_avg: field_f64(rates, "http.request_rate"),
        latency: LatencySummary {
            p50: field_f64(response_time, "p50"),
            p95: field_f64(response_time, "p95"),
            p99: field_f64(response_time, "p99"),
        },
        errors,
    })
}

fn field_u64(obj: Option<&Value>, key: &str) -> u64 {
    obj.and_then(|o| o.get(key)).map(count_of).unwrap_or(0)
}

fn field_f64(obj: Option<&Value>, key: &str) -> f64 {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn count_of(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
        .unwrap_or(0)
}

fn object_counts(obj: Option<&Value>) -> BTreeMap<String, u64> {
    obj.and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), count_of(value)))
                .collect()
        })
        .unwrap_or_default()
}
