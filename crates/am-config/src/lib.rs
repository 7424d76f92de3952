//! Artillery MCP configuration.
//!
//! Environment variables are read in exactly one place: [`load_config`].
//! The result is a single validated, immutable [`ExecutionConfig`] that the
//! rest of the system shares by reference; no component re-reads the
//! environment after startup.

pub mod detect;
pub mod load;
pub mod validate;

pub use detect::detect_binary;
pub use load::{load_config, ConfigOptions, ExecutionConfig};
pub use validate::{ConfigError, ConfigResult};
