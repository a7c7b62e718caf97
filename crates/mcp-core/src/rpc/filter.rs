use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpCoreError;

/// A session-wide hook around every inbound request a `Dispatcher` handles,
/// plus a read-only look at inbound notifications. Registered via
/// `Dispatcher::register_message_filter`; the last one registered wraps
/// every filter registered before it.
///
/// This is distinct from `server::Pipeline`, which wraps one handler at
/// registration time (e.g. just `tools/call`); a `MessageFilter` applies to
/// every method the dispatcher routes, without each handler opting in.
#[async_trait]
pub trait MessageFilter: Send + Sync {
    async fn before_request(&self, method: &str, params: Option<Value>) -> Result<Option<Value>, McpCoreError> {
        let _ = method;
        Ok(params)
    }

    async fn after_request(&self, method: &str, result: Result<Value, McpCoreError>) -> Result<Value, McpCoreError> {
        let _ = method;
        result
    }

    async fn on_notification(&self, method: &str, params: &Option<Value>) {
        let _ = (method, params);
    }
}
