//! MCP server implementation with stdio transport.
//!
//! Reads JSON-RPC 2.0 messages from stdin, dispatches to handlers, and
//! writes responses to stdout. Logs stay on stderr so the protocol stream
//! is never polluted.

use crate::facade::ArtilleryFacade;
use crate::mcp::protocol::*;
use crate::mcp::tools;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP server state.
pub struct McpServer {
    facade: Arc<ArtilleryFacade>,
    initialized: bool,
}

impl McpServer {
    pub fn new(facade: Arc<ArtilleryFacade>) -> Self {
        Self {
            facade,
            initialized: false,
        }
    }

    /// Run the stdio event loop: read lines from stdin, dispatch, write to
    /// stdout.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        info!("serving MCP over stdio");
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = self.handle_message(trimmed);

            // Notifications (no id) get no response
            if let Some(resp) = response {
                let json = serde_json::to_string(&resp).unwrap_or_else(|_| {
                    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Serialization failed"}}"#
                        .to_string()
                });
                writeln!(stdout, "{}", json)?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC message and return a response (or None for
    /// notifications).
    pub fn handle_message(&mut self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(_) => {
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    "Parse error: invalid JSON",
                ));
            }
        };

        // Notifications have no id — don't send a response
        if request.id.is_none() {
            self.handle_notification(&request.method);
            return None;
        }

        let id = request.id.clone();

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params),
            "ping" => Ok(serde_json::json!({})),
            _ => Err((
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, msg)) => JsonRpcResponse::error(id, code, msg),
        })
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" => {
                self.initialized = true;
                debug!("client initialized");
            }
            "notifications/cancelled" => {
                // No caller-initiated cancellation; the in-flight subprocess
                // finishes or times out on its own.
                warn!("client sent cancellation; running calls are not interruptible");
            }
            _ => {
                debug!(method, "unknown notification");
            }
        }
    }

    fn handle_initialize(
        &mut self,
        _params: &serde_json::Value,
    ) -> Result<serde_json::Value, (i32, String)> {
        Ok(serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
            },
            "serverInfo": ServerInfo {
                name: "artillery-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, (i32, String)> {
        let defs = tools::tool_definitions();
        Ok(serde_json::json!({ "tools": defs }))
    }

    fn handle_tools_call(
        &self,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, (i32, String)> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or((INVALID_PARAMS, "Missing 'name' in tools/call".to_string()))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        match tools::call_tool(&self.facade, name, &arguments) {
            Ok(content) => Ok(serde_json::json!({
                "content": content,
                "isError": false,
            })),
            Err(msg) => Ok(serde_json::json!({
                "content": [ToolContent::text(msg)],
                "isError": true,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_config::ExecutionConfig;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn server(dir: &tempfile::TempDir) -> McpServer {
        let work_dir = dir.path().canonicalize().unwrap();
        let binary = work_dir.join("artillery-stub");
        std::fs::write(&binary, "#!/bin/sh\necho 2.0.14\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = ExecutionConfig {
            binary_path: binary,
            work_dir,
            timeout: Duration::from_secs(10),
            max_output_bytes: 1024 * 1024,
            allow_quick: true,
        };
        McpServer::new(Arc::new(ArtilleryFacade::new(Arc::new(config))))
    }

    #[test]
    fn handle_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s.handle_message("not json").unwrap();
        assert_eq!(resp.error.as_ref().unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn handle_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1.0"}}}"#)
            .unwrap();
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "artillery-mcp");
    }

    #[test]
    fn handle_notification_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s.handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        assert!(resp.is_none());
        assert!(s.initialized);
    }

    #[test]
    fn handle_ping() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#)
            .unwrap();
        assert!(resp.error.is_none());
    }

    #[test]
    fn handle_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"foo/bar"}"#)
            .unwrap();
        assert_eq!(resp.error.as_ref().unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn handle_tools_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":4,"method":"tools/list"}"#)
            .unwrap();
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
    }

    #[test]
    fn handle_tools_call_missing_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#)
            .unwrap();
        assert_eq!(resp.error.as_ref().unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn handle_tools_call_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"artillery_get_version","arguments":{}}}"#)
            .unwrap();
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
    }

    #[test]
    fn handle_tools_call_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"nonexistent","arguments":{}}}"#)
            .unwrap();
        // Returns isError in content, not a protocol error
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn tool_failure_keeps_uniform_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        let resp = s
            .handle_message(r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"artillery_run_test","arguments":{"config_path":"missing.yml"}}}"#)
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        let record: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(record["status"], "error");
        assert_eq!(record["error"]["code"], "VALIDATION_ERROR");
    }
}
