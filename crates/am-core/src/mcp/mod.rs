//! MCP (Model Context Protocol) server for the artillery adapter.
//!
//! Exposes load-testing operations to AI agents via the standardized MCP
//! protocol over stdio (JSON-RPC 2.0).

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
