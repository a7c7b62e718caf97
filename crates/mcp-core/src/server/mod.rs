//! Server-side orchestration above the raw dispatcher: capability-gated
//! `Sample`/`Elicit`/`RequestRoots` calls back to the client, task-capability
//! negotiation, and the request filter pipeline.

mod filter;
mod negotiation;
mod peer;
mod task_endpoints;
mod tools;

pub use filter::{Pipeline, RequestFilter, RequestLogger};
pub use negotiation::validate_task_request;
pub use peer::Peer;
pub use task_endpoints::register_task_endpoints;
pub use tools::{register_tools, ToolHandler, ToolRegistry};
