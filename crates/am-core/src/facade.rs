//! High-level artillery operations.
//!
//! Composes the path sanitizer, process runner, and result summarizer into
//! the operations exposed to callers: file runs, inline runs, quick tests,
//! and version queries. Each call moves through validate → (materialize
//! temp config) → execute → (summarize); nothing is shared across calls
//! beyond the immutable configuration.

use am_common::{Error, ExecutionResult, Result};
use am_config::ExecutionConfig;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::duration::parse_duration_secs;
use crate::runner::{ProcessOutcome, ProcessRunner, RunOptions};
use crate::sanitize::sanitize;
use crate::summary::summarize;

/// Bytes of captured output echoed back to the caller.
const LOG_TAIL_BYTES: usize = 2048;

/// Timeout for `--version` queries.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Message returned by validate-only runs; no subprocess is spawned.
const VALIDATE_ONLY_MESSAGE: &str = "Configuration file is valid; no test was executed.";

/// Default virtual-user count for quick tests.
const DEFAULT_QUICK_VUS: u64 = 10;

/// Default requests per virtual user for quick tests.
const DEFAULT_QUICK_REQUESTS: u64 = 30;

/// Options shared by file and inline runs.
#[derive(Debug, Clone, Default)]
pub struct RunTestOptions {
    /// Where artillery should write its JSON results.
    pub output_json: Option<String>,

    /// Where artillery should write an HTML report.
    pub report_html: Option<String>,

    /// Environment overrides for the subprocess.
    pub env: Vec<(String, String)>,

    /// Working-directory override, resolved under the work directory.
    pub cwd: Option<String>,

    /// Validate the config without running any traffic.
    pub validate_only: bool,
}

/// Options for ad-hoc quick tests.
#[derive(Debug, Clone, Default)]
pub struct QuickTestOptions {
    /// Virtual-user count.
    pub count: Option<u64>,

    /// Requests per virtual user.
    pub num: Option<u64>,

    /// Target request rate in requests per second.
    pub rate: Option<f64>,

    /// Test duration token, e.g. "30s" or "2m".
    pub duration: Option<String>,
}

/// The component the rest of the system calls.
pub struct ArtilleryFacade {
    config: Arc<ExecutionConfig>,
    runner: ProcessRunner,
}

impl ArtilleryFacade {
    pub fn new(config: Arc<ExecutionConfig>) -> Self {
        let runner = ProcessRunner::new(&config);
        Self { config, runner }
    }

    /// The shared immutable configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run a test from an existing config file under the work directory.
    pub fn run_from_file(&self, path: &str, options: &RunTestOptions) -> Result<ExecutionResult> {
        let work_dir = self.resolve_work_dir(options.cwd.as_deref())?;
        let config_path = sanitize(Path::new(path), &work_dir)?;

        if options.validate_only {
            // Validation never reaches the subprocess; see DESIGN.md.
            info!(path = %config_path.display(), "validate-only run short-circuited");
            return Ok(ExecutionResult {
                exit_code: 0,
                elapsed_ms: 0,
                logs: VALIDATE_ONLY_MESSAGE.to_string(),
                output_json: None,
                report_html: None,
                summary: None,
            });
        }

        let output_json = options
            .output_json
            .as_deref()
            .map(|p| absolutize(&work_dir, p));
        let report_html = options
            .report_html
            .as_deref()
            .map(|p| absolutize(&work_dir, p));

        let mut args: Vec<String> = vec!["run".to_string()];
        if let Some(out) = &output_json {
            args.push("--output".to_string());
            args.push(out.display().to_string());
        }
        if let Some(report) = &report_html {
            args.push("--report".to_string());
            args.push(report.display().to_string());
        }
        args.push(config_path.display().to_string());

        debug!(path = %config_path.display(), args = ?args, "running test from file");
        let run_options = RunOptions {
            cwd: Some(work_dir),
            env: options.env.clone(),
            timeout: None,
        };
        let outcome = self.runner.run(&args, &run_options)?;
        Ok(self.finish_run(outcome, output_json, report_html))
    }

    /// Run a test from inline config text.
    ///
    /// The text is materialized verbatim to a timestamp-named file under
    /// `temp/` and removed again on every exit path.
    pub fn run_inline(&self, config_text: &str, options: &RunTestOptions) -> Result<ExecutionResult> {
        let work_dir = self.resolve_work_dir(options.cwd.as_deref())?;
        let temp_dir = work_dir.join("temp");
        std::fs::create_dir_all(&temp_dir)?;

        let temp_path = temp_dir.join(format!("config-{}.yml", Utc::now().timestamp_millis()));
        std::fs::write(&temp_path, config_text)?;
        let _cleanup = TempConfig(temp_path.clone());

        debug!(temp = %temp_path.display(), "materialized inline config");
        self.run_from_file(&temp_path.display().to_string(), options)
    }

    /// Run artillery's built-in ad-hoc mode against a single URL.
    pub fn quick_test(&self, target_url: &str, options: &QuickTestOptions) -> Result<ExecutionResult> {
        if !self.config.allow_quick {
            return Err(Error::QuickDisabled);
        }
        if target_url.is_empty() {
            return Err(Error::InvalidArgument("target_url must not be empty".into()));
        }

        let duration_secs = options.duration.as_deref().map(parse_duration_secs);
        let vus = resolve_vu_count(options, duration_secs);
        let per_vu = resolve_request_count(options, duration_secs, vus);
        let output_path = self
            .config
            .work_dir
            .join(format!("quick-test-{}.json", Utc::now().timestamp_millis()));

        let mut args: Vec<String> = vec![
            "quick".to_string(),
            target_url.to_string(),
            "-c".to_string(),
            vus.to_string(),
            "-n".to_string(),
            per_vu.to_string(),
            "-o".to_string(),
            output_path.display().to_string(),
        ];
        if target_url.starts_with("https://") {
            args.push("-k".to_string());
        }

        info!(url = target_url, vus, per_vu, "starting quick test");
        let run_options = RunOptions {
            cwd: Some(self.config.work_dir.clone()),
            env: Vec::new(),
            timeout: None,
        };
        let outcome = self.runner.run(&args, &run_options)?;
        Ok(self.finish_run(outcome, Some(output_path), None))
    }

    /// Query the wrapped binary's version string.
    pub fn get_version(&self) -> Result<String> {
        let options = RunOptions {
            timeout: Some(VERSION_TIMEOUT),
            ..Default::default()
        };
        let outcome = self
            .runner
            .run(&["--version".to_string()], &options)
            .map_err(|e| Error::Execution(format!("version query failed: {e}")))?;
        if !outcome.success() {
            return Err(Error::Execution(format!(
                "version query exited with code {}: {}",
                outcome.exit_code,
                outcome.stderr_str().trim()
            )));
        }
        Ok(outcome.stdout_str().trim().to_string())
    }

    /// Resolve the effective work directory for one call.
    fn resolve_work_dir(&self, cwd: Option<&str>) -> Result<PathBuf> {
        match cwd {
            None => Ok(self.config.work_dir.clone()),
            Some(dir) => {
                let resolved = sanitize(Path::new(dir), &self.config.work_dir)?;
                if !resolved.is_dir() {
                    return Err(Error::InvalidArgument(format!(
                        "cwd {dir} is not a directory"
                    )));
                }
                Ok(resolved)
            }
        }
    }

    /// Build the caller-facing record; summarization is best-effort.
    fn finish_run(
        &self,
        outcome: ProcessOutcome,
        output_json: Option<PathBuf>,
        report_html: Option<PathBuf>,
    ) -> ExecutionResult {
        let summary = match (&output_json, outcome.success()) {
            (Some(path), true) => match summarize(path) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, "summarization failed, reporting run without summary");
                    None
                }
            },
            _ => None,
        };

        ExecutionResult {
            exit_code: outcome.exit_code,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            logs: log_tail(&outcome),
            output_json,
            report_html,
            summary,
        }
    }
}

/// Deletes the materialized inline config on every exit path.
struct TempConfig(PathBuf);

impl Drop for TempConfig {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(temp = %self.0.display(), error = %e, "failed to remove temp config");
        }
    }
}

/// Virtual-user count: explicit count, else the rate spread over the
/// duration, else a small default.
fn resolve_vu_count(options: &QuickTestOptions, duration_secs: Option<u64>) -> u64 {
    if let Some(count) = options.count {
        return count.max(1);
    }
    if let Some(rate) = options.rate {
        let secs = duration_secs.unwrap_or(1);
        return (rate * secs as f64).ceil().max(1.0) as u64;
    }
    DEFAULT_QUICK_VUS
}

/// Requests per virtual user: explicit, else the rate/duration spread
/// divided across users, else one request per second of duration, else a
/// small default.
fn resolve_request_count(
    options: &QuickTestOptions,
    duration_secs: Option<u64>,
    vus: u64,
) -> u64 {
    if let Some(num) = options.num {
        return num.max(1);
    }
    if let Some(rate) = options.rate {
        let secs = duration_secs.unwrap_or(1);
        return ((rate * secs as f64) / vus.max(1) as f64).ceil().max(1.0) as u64;
    }
    if let Some(secs) = duration_secs {
        return secs.max(1);
    }
    DEFAULT_QUICK_REQUESTS
}

fn absolutize(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Last `max` bytes of the combined output, kept on a char boundary.
fn log_tail(outcome: &ProcessOutcome) -> String {
    let mut text = outcome.stdout_str();
    let err = outcome.stderr_str();
    if !err.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&err);
    }
    if text.len() <= LOG_TAIL_BYTES {
        return text;
    }
    let mut start = text.len() - LOG_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
