//! Configuration loading.
//!
//! Resolution order for every setting: programmatic override (tests, CLI)
//! → environment variable → built-in default. The returned
//! [`ExecutionConfig`] is validated and immutable.

use crate::detect::detect_binary;
use crate::validate::{
    validate_max_output_mb, validate_timeout_ms, validate_work_dir, ConfigError, ConfigResult,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default subprocess timeout (5 minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Default per-stream output cap in megabytes.
pub const DEFAULT_MAX_OUTPUT_MB: u64 = 10;

/// Process-wide execution configuration, constructed once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionConfig {
    /// Resolved path to the artillery executable.
    pub binary_path: PathBuf,

    /// Sandbox root all user-supplied paths are resolved against.
    pub work_dir: PathBuf,

    /// Upper bound on any single subprocess's wall-clock runtime.
    #[serde(serialize_with = "ser_millis")]
    pub timeout: Duration,

    /// Cap on captured stdout/stderr, per stream.
    pub max_output_bytes: usize,

    /// Whether the quick-test capability is exposed.
    pub allow_quick: bool,
}

fn ser_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ExecutionConfig {
    /// The configured output cap expressed in megabytes.
    pub fn max_output_mb(&self) -> u64 {
        (self.max_output_bytes / (1024 * 1024)) as u64
    }
}

/// Programmatic overrides for [`load_config`]. Any field left `None` falls
/// back to the corresponding environment variable, then the default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Artillery binary path (env: `ARTILLERY_BIN`, else PATH probe).
    pub binary_path: Option<PathBuf>,

    /// Work directory (env: `ARTILLERY_WORK_DIR`, else the current dir).
    pub work_dir: Option<PathBuf>,

    /// Subprocess timeout in ms (env: `ARTILLERY_TIMEOUT_MS`).
    pub timeout_ms: Option<u64>,

    /// Per-stream output cap in MB (env: `ARTILLERY_MAX_OUTPUT_MB`).
    pub max_output_mb: Option<u64>,

    /// Quick-test gate (env: `ARTILLERY_ALLOW_QUICK`).
    pub allow_quick: Option<bool>,
}

/// Load and validate the execution configuration.
///
/// This is the only place in the system that reads environment variables.
pub fn load_config(options: &ConfigOptions) -> ConfigResult<ExecutionConfig> {
    let work_dir = match &options.work_dir {
        Some(dir) => dir.clone(),
        None => match std::env::var("ARTILLERY_WORK_DIR") {
            Ok(val) if !val.is_empty() => PathBuf::from(val),
            _ => std::env::current_dir().map_err(|e| ConfigError::IoError(e.to_string()))?,
        },
    };
    validate_work_dir(&work_dir)?;
    let work_dir = work_dir
        .canonicalize()
        .map_err(|e| ConfigError::WorkDirInvalid {
            path: work_dir.display().to_string(),
            reason: e.to_string(),
        })?;

    let timeout_ms = resolve_u64(options.timeout_ms, "ARTILLERY_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
    validate_timeout_ms(timeout_ms)?;

    let max_output_mb = resolve_u64(
        options.max_output_mb,
        "ARTILLERY_MAX_OUTPUT_MB",
        DEFAULT_MAX_OUTPUT_MB,
    )?;
    validate_max_output_mb(max_output_mb)?;

    let allow_quick = match options.allow_quick {
        Some(v) => v,
        None => match std::env::var("ARTILLERY_ALLOW_QUICK") {
            Ok(val) => parse_bool("ARTILLERY_ALLOW_QUICK", &val)?,
            Err(_) => true,
        },
    };

    let binary_path = match &options.binary_path {
        Some(p) => {
            if !Path::new(p).exists() {
                return Err(ConfigError::BinaryNotFound(format!(
                    "configured binary {} does not exist",
                    p.display()
                )));
            }
            p.clone()
        }
        None => {
            let env_override = std::env::var("ARTILLERY_BIN").ok();
            detect_binary(env_override.as_deref())?
        }
    };

    let config = ExecutionConfig {
        binary_path,
        work_dir,
        timeout: Duration::from_millis(timeout_ms),
        max_output_bytes: (max_output_mb * 1024 * 1024) as usize,
        allow_quick,
    };

    info!(
        binary = %config.binary_path.display(),
        work_dir = %config.work_dir.display(),
        timeout_ms,
        max_output_mb,
        allow_quick,
        "configuration loaded"
    );

    Ok(config)
}

fn resolve_u64(override_val: Option<u64>, env_name: &str, default: u64) -> ConfigResult<u64> {
    if let Some(v) = override_val {
        return Ok(v);
    }
    match std::env::var(env_name) {
        Ok(val) => val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: env_name.to_string(),
            message: format!("not an integer: {val:?}"),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(field: &str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("not a boolean: {other:?}"),
        }),
    }
}
