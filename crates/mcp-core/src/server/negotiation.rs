use mcp_protocol::ServerCapabilities;

use crate::error::McpCoreError;

/// Checks whether a server is allowed to accept a `task` metadata block on
/// an inbound `method` call, per its advertised `ServerTasksCapability`.
/// Call this before honoring a request's `task` field; a caller that never
/// sets `task` never needs it.
pub fn validate_task_request(capabilities: &ServerCapabilities, method: &str) -> Result<(), McpCoreError> {
    let allowed = capabilities
        .tasks
        .as_ref()
        .map(|tasks| tasks.requests.allows(method))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(McpCoreError::TaskNotSupportedForMethod {
            method: method.to_string(),
        })
    }
}
