//! Artillery MCP server - entry point
//!
//! Wraps the artillery load-testing CLI behind an MCP stdio server:
//! - `serve` (default): speak JSON-RPC 2.0 over stdio
//! - `check`: validate configuration and probe the binary
//! - `version`: print version information

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use am_common::{OutputFormat, SCHEMA_VERSION};
use am_config::{load_config, ConfigError, ConfigOptions};
use am_core::capabilities::capability_report;
use am_core::exit_codes::ExitCode;
use am_core::facade::ArtilleryFacade;
use am_core::logging::{init_logging, LogConfig, LogLevel};
use am_core::mcp::McpServer;

/// Artillery MCP - load-test execution for AI agents
#[derive(Parser)]
#[command(name = "artillery-mcp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands.
///
/// Environment fallbacks (ARTILLERY_BIN, ARTILLERY_WORK_DIR, ...) are
/// resolved inside the config loader, not here, so the environment is read
/// in exactly one place.
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the artillery binary
    #[arg(long, global = true)]
    binary: Option<PathBuf>,

    /// Sandbox root for all user-supplied paths
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Subprocess timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Per-stream output cap in megabytes
    #[arg(long, global = true)]
    max_output_mb: Option<u64>,

    /// Expose the quick-test tool
    #[arg(long, global = true)]
    allow_quick: Option<bool>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio (default)
    Serve,

    /// Validate configuration and probe the artillery binary
    Check,

    /// Print version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        LogLevel::Error
    } else {
        match cli.global.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    };
    init_logging(&LogConfig::from_env(Some(log_level), None));

    let exit_code = match cli.command {
        None | Some(Commands::Serve) => run_serve(&cli.global),
        Some(Commands::Check) => run_check(&cli.global),
        Some(Commands::Version) => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn config_options(global: &GlobalOpts) -> ConfigOptions {
    ConfigOptions {
        binary_path: global.binary.clone(),
        work_dir: global.work_dir.clone(),
        timeout_ms: global.timeout_ms,
        max_output_mb: global.max_output_mb,
        allow_quick: global.allow_quick,
    }
}

fn run_serve(global: &GlobalOpts) -> ExitCode {
    let config = match load_config(&config_options(global)) {
        Ok(config) => config,
        Err(e) => return output_config_error(global, &e),
    };

    let facade = Arc::new(ArtilleryFacade::new(Arc::new(config)));
    let mut server = McpServer::new(facade);
    match server.run_stdio() {
        Ok(()) => ExitCode::Clean,
        Err(e) => {
            eprintln!("stdio transport failed: {e}");
            ExitCode::IoError
        }
    }
}

fn run_check(global: &GlobalOpts) -> ExitCode {
    let config = match load_config(&config_options(global)) {
        Ok(config) => config,
        Err(e) => return output_config_error(global, &e),
    };

    let facade = ArtilleryFacade::new(Arc::new(config));
    let report = capability_report(&facade);

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "ok",
                "capabilities": report,
            });
            println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
        }
        OutputFormat::Summary => {
            println!(
                "check: OK (artillery {}, timeout {}ms, quick {})",
                report.artillery_version.as_deref().unwrap_or("unknown"),
                report.timeout_ms,
                if report.allow_quick { "on" } else { "off" }
            );
        }
        OutputFormat::Human => {
            println!("# artillery-mcp check");
            println!();
            println!("Binary: {}", report.binary_path);
            println!(
                "Artillery version: {}",
                report.artillery_version.as_deref().unwrap_or("unknown (probe failed)")
            );
            println!("Work directory: {}", report.work_dir);
            println!("Timeout: {}ms", report.timeout_ms);
            println!("Output cap: {}MB per stream", report.max_output_mb);
            println!("Quick tests: {}", if report.allow_quick { "enabled" } else { "disabled" });
        }
    }

    ExitCode::Clean
}

/// Output a config error in the appropriate format.
fn output_config_error(global: &GlobalOpts, error: &ConfigError) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "error": {
                    "code": error.code(),
                    "message": error.to_string(),
                }
            });
            eprintln!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
        }
        OutputFormat::Summary => {
            eprintln!("config error: {error}");
        }
        OutputFormat::Human => {
            eprintln!("# Configuration Error");
            eprintln!();
            eprintln!("Error: {error}");
        }
    }
    ExitCode::ConfigError
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "artillery_mcp_version": env!("CARGO_PKG_VERSION"),
            });
            println!("{}", serde_json::to_string_pretty(&version_info).unwrap_or_default());
        }
        _ => {
            println!("artillery-mcp {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}
