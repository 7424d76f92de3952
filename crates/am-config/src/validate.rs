//! Configuration validation errors and semantic validation.

use std::path::Path;
use thiserror::Error;

/// Validation result type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All of these are startup-fatal: the server refuses
/// to start rather than run with an unsafe or unusable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("artillery binary not found: {0}")]
    BinaryNotFound(String),

    #[error("work directory {path} is not usable: {reason}")]
    WorkDirInvalid { path: String, reason: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::IoError(_) => 60,
            ConfigError::BinaryNotFound(_) => 11,
            ConfigError::WorkDirInvalid { .. } => 12,
            ConfigError::InvalidValue { .. } => 13,
        }
    }
}

/// Minimum subprocess timeout (1 second).
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Maximum subprocess timeout (2 hours).
pub const MAX_TIMEOUT_MS: u64 = 7_200_000;

/// Minimum per-stream output cap in megabytes.
pub const MIN_OUTPUT_MB: u64 = 1;

/// Maximum per-stream output cap in megabytes.
pub const MAX_OUTPUT_MB: u64 = 100;

/// Check the timeout against the allowed range.
pub fn validate_timeout_ms(timeout_ms: u64) -> ConfigResult<()> {
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(ConfigError::InvalidValue {
            field: "timeout_ms".to_string(),
            message: format!(
                "must be in [{MIN_TIMEOUT_MS}, {MAX_TIMEOUT_MS}], got {timeout_ms}"
            ),
        });
    }
    Ok(())
}

/// Check the output cap against the allowed range.
pub fn validate_max_output_mb(max_output_mb: u64) -> ConfigResult<()> {
    if !(MIN_OUTPUT_MB..=MAX_OUTPUT_MB).contains(&max_output_mb) {
        return Err(ConfigError::InvalidValue {
            field: "max_output_mb".to_string(),
            message: format!(
                "must be in [{MIN_OUTPUT_MB}, {MAX_OUTPUT_MB}], got {max_output_mb}"
            ),
        });
    }
    Ok(())
}

/// Check that the work directory exists and is a directory.
pub fn validate_work_dir(path: &Path) -> ConfigResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| ConfigError::WorkDirInvalid {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(ConfigError::WorkDirInvalid {
            path: path.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_range_boundaries() {
        assert!(validate_timeout_ms(MIN_TIMEOUT_MS).is_ok());
        assert!(validate_timeout_ms(MAX_TIMEOUT_MS).is_ok());
        assert!(validate_timeout_ms(MIN_TIMEOUT_MS - 1).is_err());
        assert!(validate_timeout_ms(MAX_TIMEOUT_MS + 1).is_err());
    }

    #[test]
    fn output_range_boundaries() {
        assert!(validate_max_output_mb(1).is_ok());
        assert!(validate_max_output_mb(100).is_ok());
        assert!(validate_max_output_mb(0).is_err());
        assert!(validate_max_output_mb(101).is_err());
    }

    #[test]
    fn work_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_work_dir(dir.path()).is_ok());
        assert!(validate_work_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn work_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        match validate_work_dir(&file) {
            Err(ConfigError::WorkDirInvalid { reason, .. }) => {
                assert!(reason.contains("not a directory"));
            }
            other => panic!("expected WorkDirInvalid, got {other:?}"),
        }
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ConfigError::BinaryNotFound("x".into()).code(), 11);
        assert_eq!(
            ConfigError::InvalidValue {
                field: "f".into(),
                message: "m".into()
            }
            .code(),
            13
        );
    }
}
