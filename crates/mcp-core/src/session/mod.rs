//! Per-connection session state: the `initialize` handshake, built-in
//! `ping`/`logging/setLevel` handlers, and capability negotiation bookkeeping.

mod handshake;
mod log_level;
#[allow(clippy::module_inception)]
mod session;

pub use handshake::{InitializeParams, InitializeResult, PROTOCOL_VERSION};
pub use log_level::LogLevel;
pub use session::Session;
