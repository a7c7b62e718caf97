use std::sync::Arc;

use mcp_protocol::ServerCapabilities;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::rpc::FnRequestHandler;
use crate::session::Session;
use crate::tasks::TaskStore;

/// Registers the client-facing task polling surface: `tasks/get`,
/// `tasks/list`, and `tasks/cancel`. These sit alongside whatever
/// task-augmented request types a server supports (`tools/call` today)
/// and talk to the same `TaskStore`.
pub fn register_task_endpoints(session: &Arc<Session>, task_store: Arc<dyn TaskStore>, server_capabilities: ServerCapabilities) {
    let get_store = Arc::clone(&task_store);
    session.dispatcher.on_request(
        "tasks/get",
        Arc::new(FnRequestHandler(move |params| {
            let store = Arc::clone(&get_store);
            async move { handle_tasks_get(params, store).await }
        })),
    );

    let list_store = Arc::clone(&task_store);
    let list_caps = server_capabilities.clone();
    session.dispatcher.on_request(
        "tasks/list",
        Arc::new(FnRequestHandler(move |_params| {
            let store = Arc::clone(&list_store);
            let caps = list_caps.clone();
            async move {
                require_capability(&caps, |t| t.list)?;
                let tasks = store.list().await;
                Ok(serde_json::json!({ "tasks": tasks }))
            }
        })),
    );

    let cancel_store = Arc::clone(&task_store);
    let cancel_caps = server_capabilities;
    session.dispatcher.on_request(
        "tasks/cancel",
        Arc::new(FnRequestHandler(move |params| {
            let store = Arc::clone(&cancel_store);
            let caps = cancel_caps.clone();
            async move { handle_tasks_cancel(params, store, caps).await }
        })),
    );
}

fn require_capability(
    caps: &ServerCapabilities,
    predicate: impl Fn(&mcp_protocol::ServerTasksCapability) -> bool,
) -> Result<(), McpCoreError> {
    let allowed = caps.tasks.as_ref().map(&predicate).unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        Err(McpCoreError::TaskNotSupportedForMethod {
            method: "tasks".to_string(),
        })
    }
}

fn task_id_from(params: &Option<Value>, method: &str) -> Result<String, McpCoreError> {
    params
        .as_ref()
        .and_then(|p| p.get("taskId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| McpCoreError::InvalidParams {
            method: method.to_string(),
            reason: "missing taskId".to_string(),
        })
}

async fn handle_tasks_get(params: Option<Value>, store: Arc<dyn TaskStore>) -> Result<Value, McpCoreError> {
    let task_id = task_id_from(&params, "tasks/get")?;
    let task = store.get(&task_id).await.ok_or_else(|| McpCoreError::TaskNotFound(task_id.clone()))?;

    if task.status.is_terminal() {
        if let Ok(result) = store.get_result(&task_id).await {
            return Ok(serde_json::json!({ "task": task, "result": result }));
        }
    }
    Ok(serde_json::json!({ "task": task }))
}

async fn handle_tasks_cancel(
    params: Option<Value>,
    store: Arc<dyn TaskStore>,
    caps: ServerCapabilities,
) -> Result<Value, McpCoreError> {
    require_capability(&caps, |t| t.cancel)?;
    let task_id = task_id_from(&params, "tasks/cancel")?;
    let task = store.cancel(&task_id).await?;
    Ok(serde_json::json!({ "task": task }))
}
