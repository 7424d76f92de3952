//! MCP tool implementations.
//!
//! Each tool wraps one facade operation. Every call resolves to the uniform
//! outcome record `{status: "ok", data} | {status: "error", error}`; typed
//! failures become structured error records and anything unexpected is
//! caught at this boundary and reported as an internal error, so the server
//! process never crashes on a tool call.

use am_common::Error;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tracing::{debug, error};

use crate::capabilities::capability_report;
use crate::facade::{ArtilleryFacade, QuickTestOptions, RunTestOptions};
use crate::mcp::protocol::{ToolContent, ToolDefinition};
use crate::sanitize::sanitize;
use crate::summary::parse_results;

/// Build the list of available MCP tool definitions.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "artillery_run_test".to_string(),
            description: "Run a load test from a config file under the work directory. \
                          Returns exit code, captured logs, and an aggregate summary."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "config_path": {
                        "type": "string",
                        "description": "Test config path, relative to the work directory"
                    },
                    "output_json": {
                        "type": "string",
                        "description": "Where artillery writes its JSON results"
                    },
                    "report_html": {
                        "type": "string",
                        "description": "Where artillery writes an HTML report"
                    },
                    "env": {
                        "type": "object",
                        "description": "Environment overrides for the subprocess",
                        "additionalProperties": {"type": "string"}
                    },
                    "cwd": {
                        "type": "string",
                        "description": "Working-directory override under the work directory"
                    },
                    "validate_only": {
                        "type": "boolean",
                        "description": "Validate the config without running traffic",
                        "default": false
                    }
                },
                "required": ["config_path"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "artillery_run_inline".to_string(),
            description: "Run a load test from inline YAML config text. The text is \
                          written to a temp file that is removed after the run."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "config_text": {
                        "type": "string",
                        "description": "Complete artillery config as YAML text"
                    },
                    "output_json": {"type": "string"},
                    "report_html": {"type": "string"},
                    "env": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    },
                    "cwd": {"type": "string"},
                    "validate_only": {"type": "boolean", "default": false}
                },
                "required": ["config_text"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "artillery_quick_test".to_string(),
            description: "Run an ad-hoc quick test against a single URL using \
                          artillery's built-in quick mode."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "target_url": {
                        "type": "string",
                        "description": "URL to test"
                    },
                    "count": {
                        "type": "integer",
                        "description": "Virtual-user count",
                        "minimum": 1
                    },
                    "num": {
                        "type": "integer",
                        "description": "Requests per virtual user",
                        "minimum": 1
                    },
                    "rate": {
                        "type": "number",
                        "description": "Target request rate (requests/second)"
                    },
                    "duration": {
                        "type": "string",
                        "description": "Test duration, e.g. \"30s\" or \"2m\""
                    }
                },
                "required": ["target_url"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "artillery_get_version".to_string(),
            description: "Report the detected artillery binary version.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "artillery_parse_results".to_string(),
            description: "Parse a result JSON file and return its full content unmodified."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "result_path": {
                        "type": "string",
                        "description": "Result file path, relative to the work directory"
                    }
                },
                "required": ["result_path"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "artillery_capabilities".to_string(),
            description: "Report server capabilities: versions, limits, and sandbox layout."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        },
    ]
}

/// Dispatch a tool call by name and return content blocks.
///
/// `Err` carries the serialized uniform error record; the server maps it to
/// an `isError` tool result, never a protocol-level failure.
pub fn call_tool(
    facade: &ArtilleryFacade,
    name: &str,
    params: &Value,
) -> Result<Vec<ToolContent>, String> {
    debug!(tool = name, "tool call");

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| dispatch(facade, name, params)))
        .unwrap_or_else(|panic| {
            error!(tool = name, "tool call panicked");
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Internal(message))
        });

    match outcome {
        Ok(data) => {
            let record = serde_json::json!({"status": "ok", "data": data});
            Ok(vec![ToolContent::text(pretty(&record))])
        }
        Err(e) => {
            let record = serde_json::json!({"status": "error", "error": e.to_record()});
            Err(pretty(&record))
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn dispatch(facade: &ArtilleryFacade, name: &str, params: &Value) -> am_common::Result<Value> {
    match name {
        "artillery_run_test" => tool_run_test(facade, params),
        "artillery_run_inline" => tool_run_inline(facade, params),
        "artillery_quick_test" => tool_quick_test(facade, params),
        "artillery_get_version" => tool_get_version(facade),
        "artillery_parse_results" => tool_parse_results(facade, params),
        "artillery_capabilities" => tool_capabilities(facade),
        _ => Err(Error::InvalidArgument(format!("unknown tool: {name}"))),
    }
}

fn tool_run_test(facade: &ArtilleryFacade, params: &Value) -> am_common::Result<Value> {
    let config_path = required_str(params, "config_path")?;
    let options = run_options(params)?;
    let result = facade.run_from_file(config_path, &options)?;
    Ok(serde_json::to_value(result)?)
}

fn tool_run_inline(facade: &ArtilleryFacade, params: &Value) -> am_common::Result<Value> {
    let config_text = required_str(params, "config_text")?;
    if config_text.trim().is_empty() {
        return Err(Error::InvalidArgument("config_text must not be empty".into()));
    }
    let options = run_options(params)?;
    let result = facade.run_inline(config_text, &options)?;
    Ok(serde_json::to_value(result)?)
}

fn tool_quick_test(facade: &ArtilleryFacade, params: &Value) -> am_common::Result<Value> {
    let target_url = required_str(params, "target_url")?;
    let options = QuickTestOptions {
        count: params.get("count").and_then(Value::as_u64),
        num: params.get("num").and_then(Value::as_u64),
        rate: params.get("rate").and_then(Value::as_f64),
        duration: params
            .get("duration")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    let result = facade.quick_test(target_url, &options)?;
    Ok(serde_json::to_value(result)?)
}

fn tool_get_version(facade: &ArtilleryFacade) -> am_common::Result<Value> {
    let version = facade.get_version()?;
    Ok(serde_json::json!({ "version": version }))
}

fn tool_parse_results(facade: &ArtilleryFacade, params: &Value) -> am_common::Result<Value> {
    let result_path = required_str(params, "result_path")?;
    let resolved = sanitize(Path::new(result_path), &facade.config().work_dir)?;
    Ok(parse_results(&resolved)?)
}

fn tool_capabilities(facade: &ArtilleryFacade) -> am_common::Result<Value> {
    let report = capability_report(facade);
    serde_json::to_value(&report).map_err(|e| Error::Capabilities(e.to_string()))
}

fn required_str<'a>(params: &'a Value, key: &str) -> am_common::Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("missing required parameter: {key}")))
}

fn run_options(params: &Value) -> am_common::Result<RunTestOptions> {
    let env = match params.get("env") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                let text = value.as_str().ok_or_else(|| {
                    Error::InvalidArgument(format!("env value for {key} must be a string"))
                })?;
                pairs.push((key.clone(), text.to_string()));
            }
            pairs
        }
        Some(_) => {
            return Err(Error::InvalidArgument("env must be an object".into()));
        }
    };

    Ok(RunTestOptions {
        output_json: params
            .get("output_json")
            .and_then(Value::as_str)
            .map(str::to_string),
        report_html: params
            .get("report_html")
            .and_then(Value::as_str)
            .map(str::to_string),
        env,
        cwd: params.get("cwd").and_then(Value::as_str).map(str::to_string),
        validate_only: params
            .get("validate_only")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}
