//! End-to-end CLI tests driving the compiled `artillery-mcp` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

fn sandbox() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("artillery");
    std::fs::write(&binary, "#!/bin/sh\necho 2.0.14\n").unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    (dir, binary)
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("artillery-mcp").unwrap();
    // Keep the ambient environment out of config resolution.
    cmd.env_remove("ARTILLERY_BIN")
        .env_remove("ARTILLERY_WORK_DIR")
        .env_remove("ARTILLERY_TIMEOUT_MS")
        .env_remove("ARTILLERY_MAX_OUTPUT_MB")
        .env_remove("ARTILLERY_ALLOW_QUICK");
    cmd
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn version_prints_json() {
    cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("artillery_mcp_version"))
        .stdout(predicate::str::contains("schema_version"));
}

#[test]
fn check_reports_capabilities() {
    let (dir, binary) = sandbox();
    cmd()
        .args(["check", "--binary"])
        .arg(&binary)
        .arg("--work-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"ok\""))
        .stdout(predicate::str::contains("2.0.14"))
        .stdout(predicate::str::contains("allow_quick"));
}

#[test]
fn check_rejects_out_of_range_timeout() {
    let (dir, binary) = sandbox();
    cmd()
        .args(["check", "--timeout-ms", "10", "--binary"])
        .arg(&binary)
        .arg("--work-dir")
        .arg(dir.path())
        .assert()
        .code(11)
        .stderr(predicate::str::contains("timeout_ms"));
}

#[test]
fn check_rejects_missing_binary() {
    let (dir, _binary) = sandbox();
    cmd()
        .args(["check", "--binary", "/nonexistent/artillery"])
        .arg("--work-dir")
        .arg(dir.path())
        .assert()
        .code(11)
        .stderr(predicate::str::contains("binary"));
}

#[test]
fn serve_answers_initialize_over_stdio() {
    let (dir, binary) = sandbox();
    cmd()
        .args(["serve", "--binary"])
        .arg(&binary)
        .arg("--work-dir")
        .arg(dir.path())
        .write_stdin(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#
                .to_string()
                + "\n",
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("\"protocolVersion\""))
        .stdout(predicate::str::contains("artillery-mcp"));
}

#[test]
fn serve_runs_a_tool_call_end_to_end() {
    let (dir, binary) = sandbox();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"artillery_get_version","arguments":{}}}"#,
        "\n"
    );
    cmd()
        .args(["serve", "--binary"])
        .arg(&binary)
        .arg("--work-dir")
        .arg(dir.path())
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.14"))
        .stdout(predicate::str::contains("\"isError\":false"));
}
