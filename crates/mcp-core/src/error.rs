use mcp_protocol::{error_code, JsonRpcErrorDetail, RequestId};
use thiserror::Error;

/// Runtime-level errors raised by the dispatcher, transport, and task
/// subsystem. Each variant knows how to render itself as a JSON-RPC error
/// object so handlers can propagate `?` straight out to the wire.
#[derive(Debug, Error)]
pub enum McpCoreError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("request {0} was cancelled")]
    Cancelled(RequestId),

    #[error("no session bound for this request")]
    NoSession,

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("task store is at capacity: {0}")]
    TaskLimitExceeded(String),

    #[error("task {task_id} cannot move from {from:?} to {to:?}")]
    InvalidTaskTransition {
        task_id: String,
        from: crate::tasks::TaskStatus,
        to: crate::tasks::TaskStatus,
    },

    #[error("task-augmented {method} is not supported by this server")]
    TaskNotSupportedForMethod { method: String },

    #[error("client only supports form elicitation; url elicitation was requested")]
    UrlElicitationRequired,

    #[error("duplicate session id: {0}")]
    DuplicateSession(String),

    #[error("unknown session id: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Codec(#[from] mcp_protocol::CodecError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpCoreError {
    pub fn code(&self) -> i64 {
        match self {
            McpCoreError::MethodNotFound(_) => error_code::METHOD_NOT_FOUND,
            McpCoreError::InvalidParams { .. } => error_code::INVALID_PARAMS,
            McpCoreError::Cancelled(_) => error_code::CANCELLED,
            McpCoreError::TaskNotFound(_) => error_code::TASK_NOT_FOUND,
            McpCoreError::TaskLimitExceeded(_) => error_code::TASK_LIMIT_EXCEEDED,
            McpCoreError::TaskNotSupportedForMethod { .. } => error_code::TASK_NOT_SUPPORTED_FOR_METHOD,
            McpCoreError::UrlElicitationRequired => error_code::URL_ELICITATION_REQUIRED,
            McpCoreError::Codec(_) => error_code::PARSE_ERROR,
            McpCoreError::NoSession
            | McpCoreError::InvalidTaskTransition { .. }
            | McpCoreError::DuplicateSession(_)
            | McpCoreError::UnknownSession(_)
            | McpCoreError::Internal(_) => error_code::INTERNAL_ERROR,
        }
    }

    pub fn into_detail(self) -> JsonRpcErrorDetail {
        let code = self.code();
        JsonRpcErrorDetail::new(code, self.to_string())
    }

    /// Reconstructs a domain error from a peer's error response. Mirrors the
    /// teacher's `handle_response` mapping -32800 back to `McpError::Cancelled`
    /// in `mcp/jsonrpc.rs`; anything else becomes an opaque internal error
    /// carrying the peer's message, since only the two sides that minted the
    /// code know its full domain meaning.
    pub fn from_detail(detail: JsonRpcErrorDetail, id: RequestId) -> Self {
        if detail.code == error_code::CANCELLED {
            McpCoreError::Cancelled(id)
        } else {
            McpCoreError::Internal(detail.message)
        }
    }
}
