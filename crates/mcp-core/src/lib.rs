//! Session/dispatcher state machine, Streamable HTTP transport, and the
//! durable task subsystem for an MCP server runtime.
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod rpc;
pub mod server;
pub mod session;
pub mod tasks;
pub mod transport;

pub use config::RuntimeConfig;
pub use error::McpCoreError;
