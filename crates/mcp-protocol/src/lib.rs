//! Wire types for the Model Context Protocol: the JSON-RPC envelope, request
//! ids, capability negotiation structures, content blocks, and the
//! elicitation schema subset. Transport and session behavior live in
//! `mcp-core`; this crate only knows how to encode and decode messages.
#![forbid(unsafe_code)]

pub mod capabilities;
pub mod content;
pub mod duration;
pub mod error_code;
pub mod message;
pub mod request_id;
pub mod schema;

pub use capabilities::{
    ClientCapabilities, ClientTasksCapability, CompletionsCapability, ElicitationCapability,
    Implementation, LoggingCapability, PromptsCapability, ResourcesCapability, RootsCapability,
    SamplingCapability, ServerCapabilities, ServerTasksCapability, TaskAugmentedRequests,
    ToolsCapability,
};
pub use content::{Annotations, ContentBlock};
pub use message::{decode, encode, CodecError, JsonRpcErrorDetail, JsonRpcMessage};
pub use request_id::{RequestId, RequestIdGenerator};
pub use schema::{EnumOption, PrimitiveSchema, RequestSchema, SchemaError, StringFormat, TitleStyle};
