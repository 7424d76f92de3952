//! Artillery binary detection.
//!
//! Runs once at startup. An explicit `ARTILLERY_BIN` override wins and must
//! point at an existing file; otherwise a short list of conventional binary
//! names is probed through `which`.

use crate::validate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

/// Conventional binary names probed on PATH, in order.
const CANDIDATE_NAMES: &[&str] = &["artillery", "artillery.cmd"];

/// Resolve the artillery binary path.
///
/// `override_path` is the already-read `ARTILLERY_BIN` value, if any; it is
/// returned verbatim when it exists and rejected with a descriptive error
/// when it does not. Without an override, the first candidate name that
/// resolves on PATH wins.
pub fn detect_binary(override_path: Option<&str>) -> ConfigResult<PathBuf> {
    if let Some(p) = override_path {
        let path = Path::new(p);
        if path.exists() {
            debug!(binary = %p, "using configured artillery binary");
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::BinaryNotFound(format!(
            "ARTILLERY_BIN is set to {p} but no such file exists"
        )));
    }

    for name in CANDIDATE_NAMES {
        trace!(candidate = name, "probing PATH");
        if let Some(path) = which(name) {
            debug!(binary = %path.display(), "detected artillery binary");
            return Ok(path);
        }
    }

    Err(ConfigError::BinaryNotFound(format!(
        "none of {CANDIDATE_NAMES:?} resolve on PATH; set ARTILLERY_BIN"
    )))
}

/// Resolve a command name through the system `which`.
fn which(name: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_must_exist() {
        let err = detect_binary(Some("/nonexistent/artillery")).unwrap_err();
        match err {
            ConfigError::BinaryNotFound(msg) => assert!(msg.contains("ARTILLERY_BIN")),
            other => panic!("expected BinaryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn override_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("artillery");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        let resolved = detect_binary(Some(bin.to_str().unwrap())).unwrap();
        assert_eq!(resolved, bin);
    }

    #[test]
    fn which_resolves_common_tools() {
        // `sh` exists on every platform these tests run on.
        let path = which("sh").expect("sh should resolve");
        assert!(path.is_absolute());
    }

    #[test]
    fn which_rejects_unknown_names() {
        assert!(which("no-such-binary-xyzzy-123").is_none());
    }
}
