//! Artillery MCP Core Library
//!
//! This library provides the core functionality for the artillery adapter:
//! - Subprocess execution with timeout and output caps
//! - Path sanitization against the work-directory sandbox
//! - Result-file parsing and summarization
//! - The high-level facade composing the above
//! - The MCP stdio server surface
//!
//! The binary entry point is in `main.rs`.

pub mod capabilities;
pub mod duration;
pub mod exit_codes;
pub mod facade;
pub mod logging;
pub mod mcp;
pub mod runner;
pub mod sanitize;
pub mod summary;
