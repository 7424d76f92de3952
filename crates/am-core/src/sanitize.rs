//! Path sanitization against the work-directory sandbox.
//!
//! This is the security boundary that keeps callers from pointing the
//! wrapped tool at arbitrary filesystem locations. Order matters: the path
//! is resolved to an absolute, lexically normalized form first, and the
//! containment check runs on that resolved form.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Sanitization failures.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("path escapes work directory: {path}")]
    Escape { path: String },

    #[error("file not found: {path}")]
    NotFound { path: String },
}

impl From<SanitizeError> for am_common::Error {
    fn from(e: SanitizeError) -> Self {
        match e {
            SanitizeError::Escape { path } => am_common::Error::PathEscape { path },
            SanitizeError::NotFound { path } => am_common::Error::FileNotFound { path },
        }
    }
}

/// Resolve `path` against `work_dir` and reject escapes.
///
/// `work_dir` must already be absolute and canonical (the config loader
/// guarantees this for the configured root). Containment is a component
/// prefix check on the normalized path; a symlink below the work directory
/// can still point outside it — recorded as an open question in DESIGN.md.
pub fn sanitize(path: &Path, work_dir: &Path) -> Result<PathBuf, SanitizeError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    };
    let resolved = normalize(&joined);

    if !resolved.starts_with(work_dir) {
        return Err(SanitizeError::Escape {
            path: path.display().to_string(),
        });
    }

    if !resolved.exists() {
        return Err(SanitizeError::NotFound {
            path: resolved.display().to_string(),
        });
    }

    Ok(resolved)
}

/// Lexically fold `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
