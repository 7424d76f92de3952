//! Capability reporting.
//!
//! A read-only diagnostic snapshot of what this server instance can do:
//! the detected artillery version, the effective limits, and the sandbox
//! layout. It is informational, not a negotiable contract.

use serde::Serialize;
use tracing::warn;

use crate::facade::ArtilleryFacade;

/// Diagnostic snapshot surfaced by the capabilities tool and `check` CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    /// This server's own version.
    pub server_version: String,

    /// Detected artillery version; `None` when the probe fails.
    pub artillery_version: Option<String>,

    /// Resolved artillery binary path.
    pub binary_path: String,

    /// Sandbox root for all user-supplied paths.
    pub work_dir: String,

    /// Supported transports.
    pub transports: Vec<String>,

    /// Effective subprocess timeout in milliseconds.
    pub timeout_ms: u64,

    /// Effective per-stream output cap in megabytes.
    pub max_output_mb: u64,

    /// Whether quick tests are enabled.
    pub allow_quick: bool,
}

/// Build the capability report. The version probe is best-effort; a failing
/// binary yields `artillery_version: null` rather than an error.
pub fn capability_report(facade: &ArtilleryFacade) -> CapabilityReport {
    let artillery_version = match facade.get_version() {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(error = %e, "artillery version probe failed");
            None
        }
    };

    let config = facade.config();
    CapabilityReport {
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        artillery_version,
        binary_path: config.binary_path.display().to_string(),
        work_dir: config.work_dir.display().to_string(),
        transports: vec!["stdio".to_string()],
        timeout_ms: config.timeout.as_millis() as u64,
        max_output_mb: config.max_output_mb(),
        allow_quick: config.allow_quick,
    }
}
