//! Reserved JSON-RPC and MCP error codes.

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request was cancelled via `notifications/cancelled` before it completed.
pub const CANCELLED: i64 = -32800;

/// `elicitation/create` with a `url` schema was sent to a client whose
/// capabilities declare only `form` support.
pub const URL_ELICITATION_REQUIRED: i64 = -32040;

/// A `task`-augmented request named a method the server's
/// `ServerTasksCapability::requests` gate does not allow.
pub const TASK_NOT_SUPPORTED_FOR_METHOD: i64 = -32041;

/// Lookup against a `taskId` the task store has no record of, or whose
/// result has already been collected and discarded.
pub const TASK_NOT_FOUND: i64 = -32042;

/// `create` on the task store was refused because a configured `max_tasks`
/// or `max_tasks_per_session` limit was already at capacity.
pub const TASK_LIMIT_EXCEEDED: i64 = -32043;
