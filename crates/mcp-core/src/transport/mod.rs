//! Streamable HTTP transport: the `/mcp` POST/GET/DELETE endpoint, its
//! per-session registry, and the resumable SSE event log behind it.

mod event_store;
mod headers;
mod registry;
mod streamable_http;

pub use event_store::{EventStore, InMemoryEventStore, StoredEvent};
pub use headers::{LAST_EVENT_ID_HEADER, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER};
pub use registry::{HttpSession, SessionInitializer, SessionRegistry};
pub use streamable_http::{router, StreamableHttpState};
