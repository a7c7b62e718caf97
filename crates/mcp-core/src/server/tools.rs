use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_protocol::{ContentBlock, RequestSchema, ServerCapabilities};
use serde::Deserialize;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::rpc::{FnRequestHandler, RequestHandler};
use crate::server::filter::{Pipeline, RequestLogger};
use crate::server::negotiation::validate_task_request;
use crate::server::peer::Peer;
use crate::session::Session;
use crate::tasks::{TaskExecutionContext, TaskStatus, TaskStore};

const DEFAULT_TASK_TTL: Duration = Duration::from_secs(300);

/// One callable tool: its wire-visible identity plus the async body
/// `tools/call` invokes. `input_schema` is the constrained schema subset
/// from `mcp_protocol::schema`, reused here since a tool's arguments are
/// the same shape as an elicitation request.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> RequestSchema;
    async fn call(&self, arguments: Value, peer: Arc<Peer>) -> Result<Vec<ContentBlock>, McpCoreError>;
}

/// The set of tools a server exposes. Registering it onto a `Session` wires
/// up `tools/list` and `tools/call`, including the task-augmented path: a
/// call carrying `params.task` runs in the background and returns an
/// `McpTask` handle immediately instead of blocking the request.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&Arc<dyn ToolHandler>> {
        self.tools.values().collect()
    }
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    task: Option<Value>,
}

/// Registers `tools/list` and `tools/call` onto `session`, backed by
/// `registry` and `task_store`. `server_capabilities` gates whether a
/// `task` on `tools/call` is honored at all.
pub fn register_tools(
    session: &Arc<Session>,
    registry: Arc<ToolRegistry>,
    task_store: Arc<dyn TaskStore>,
    server_capabilities: ServerCapabilities,
) {
    let list_registry = Arc::clone(&registry);
    session.dispatcher.on_request(
        "tools/list",
        Arc::new(FnRequestHandler(move |_params| {
            let registry = Arc::clone(&list_registry);
            async move {
                let tools: Vec<Value> = registry
                    .list()
                    .into_iter()
                    .map(|tool| {
                        serde_json::json!({
                            "name": tool.name(),
                            "description": tool.description(),
                            "inputSchema": tool.input_schema(),
                        })
                    })
                    .collect();
                Ok(serde_json::json!({ "tools": tools }))
            }
        })),
    );

    let call_session = Arc::clone(session);
    let call_handler: Arc<dyn RequestHandler> = Arc::new(FnRequestHandler(move |params: Option<Value>| {
        let registry = Arc::clone(&registry);
        let task_store = Arc::clone(&task_store);
        let server_capabilities = server_capabilities.clone();
        let execution_context = call_session.execution_context.clone();
        let session_id = call_session.id.clone();
        let progress_token = params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|meta| meta.get("progressToken"))
            .cloned();
        let peer = Arc::new(Peer::new(
            Arc::clone(&call_session.dispatcher),
            call_session.client_capabilities().unwrap_or_default(),
            call_session.execution_context.clone(),
            progress_token,
        ));
        async move {
            handle_tools_call(params, registry, task_store, execution_context, peer, server_capabilities, session_id).await
        }
    }));
    session.dispatcher.on_request(
        "tools/call",
        Arc::new(Pipeline::new("tools/call", vec![Arc::new(RequestLogger)], call_handler)),
    );
}

async fn handle_tools_call(
    params: Option<Value>,
    registry: Arc<ToolRegistry>,
    task_store: Arc<dyn TaskStore>,
    execution_context: TaskExecutionContext,
    peer: Arc<Peer>,
    server_capabilities: ServerCapabilities,
    session_id: String,
) -> Result<Value, McpCoreError> {
    let params: ToolCallParams = match params {
        Some(value) => serde_json::from_value(value).map_err(|e| McpCoreError::InvalidParams {
            method: "tools/call".to_string(),
            reason: e.to_string(),
        })?,
        None => {
            return Err(McpCoreError::InvalidParams {
                method: "tools/call".to_string(),
                reason: "missing params".to_string(),
            })
        }
    };

    let tool = registry
        .get(&params.name)
        .ok_or_else(|| McpCoreError::MethodNotFound(format!("tools/call: unknown tool {}", params.name)))?;

    match params.task {
        None => {
            let content = tool.call(params.arguments, peer).await?;
            Ok(serde_json::json!({ "content": content }))
        }
        Some(task_request) => {
            validate_task_request(&server_capabilities, "tools/call")?;
            let ttl = task_request
                .get("ttl")
                .and_then(Value::as_u64)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TASK_TTL);
            let poll_interval = task_request.get("pollInterval").and_then(Value::as_u64).map(Duration::from_millis);

            let task = task_store.create(Some(session_id), ttl, poll_interval).await?;
            let task_id = task.task_id.clone();

            tokio::spawn(run_tool_as_task(
                task_id,
                tool,
                params.arguments,
                peer,
                task_store,
                execution_context,
            ));

            Ok(serde_json::json!({ "task": task }))
        }
    }
}

async fn run_tool_as_task(
    task_id: String,
    tool: Arc<dyn ToolHandler>,
    arguments: Value,
    peer: Arc<Peer>,
    task_store: Arc<dyn TaskStore>,
    execution_context: TaskExecutionContext,
) {
    let task_id_for_scope = task_id.clone();
    let outcome = execution_context
        .scope(task_id_for_scope, tool.call(arguments, peer))
        .await;

    match outcome {
        Ok(content) => {
            let _ = task_store
                .store_result(&task_id, TaskStatus::Completed, serde_json::json!({ "content": content }))
                .await;
        }
        Err(err) => {
            let message = err.to_string();
            let _ = task_store
                .store_result(&task_id, TaskStatus::Failed, serde_json::json!({ "error": message }))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::InMemoryTaskStore;
    use mcp_protocol::{JsonRpcMessage, RequestId};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Duration as StdDuration};

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input back as text"
        }
        fn input_schema(&self) -> RequestSchema {
            RequestSchema::default()
        }
        async fn call(&self, arguments: Value, _peer: Arc<Peer>) -> Result<Vec<ContentBlock>, McpCoreError> {
            Ok(vec![ContentBlock::text(arguments.to_string())])
        }
    }

    fn new_session() -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(
            tx,
            ServerCapabilities::default(),
            mcp_protocol::Implementation {
                name: "demo".into(),
                version: "0.0.0".into(),
            },
        );
        (session, rx)
    }

    #[tokio::test]
    async fn tools_list_reports_registered_tools() {
        let (session, mut rx) = new_session();
        let registry = Arc::new(ToolRegistry::new().register(Arc::new(EchoTool)));
        register_tools(&session, registry, Arc::new(InMemoryTaskStore::new()), ServerCapabilities::default());

        session
            .dispatcher
            .dispatch_incoming(JsonRpcMessage::request(RequestId::Number(1), "tools/list", None))
            .await;
        let wire = rx.recv().await.unwrap();
        match serde_json::from_str::<JsonRpcMessage>(&wire).unwrap() {
            JsonRpcMessage::Response { result, .. } => {
                assert_eq!(result["tools"][0]["name"], serde_json::json!("echo"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn synchronous_tool_call_returns_content_inline() {
        let (session, mut rx) = new_session();
        let registry = Arc::new(ToolRegistry::new().register(Arc::new(EchoTool)));
        register_tools(&session, registry, Arc::new(InMemoryTaskStore::new()), ServerCapabilities::default());

        session
            .dispatcher
            .dispatch_incoming(JsonRpcMessage::request(
                RequestId::Number(1),
                "tools/call",
                Some(serde_json::json!({"name": "echo", "arguments": {"n": 1}})),
            ))
            .await;
        let wire = rx.recv().await.unwrap();
        match serde_json::from_str::<JsonRpcMessage>(&wire).unwrap() {
            JsonRpcMessage::Response { result, .. } => assert!(result["content"][0]["text"].is_string()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn task_augmented_call_returns_a_task_handle_and_completes_async() {
        let (session, mut rx) = new_session();
        let task_store = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(ToolRegistry::new().register(Arc::new(EchoTool)));
        let server_capabilities = ServerCapabilities {
            tasks: Some(mcp_protocol::ServerTasksCapability {
                requests: mcp_protocol::TaskAugmentedRequests {
                    tools_call: true,
                    sampling_create_message: false,
                    elicitation_create: false,
                },
                list: true,
                cancel: true,
            }),
            ..Default::default()
        };
        register_tools(&session, registry, Arc::clone(&task_store) as Arc<dyn TaskStore>, server_capabilities);

        session
            .dispatcher
            .dispatch_incoming(JsonRpcMessage::request(
                RequestId::Number(1),
                "tools/call",
                Some(serde_json::json!({"name": "echo", "arguments": {}, "task": {}})),
            ))
            .await;
        let wire = rx.recv().await.unwrap();
        let task_id = match serde_json::from_str::<JsonRpcMessage>(&wire).unwrap() {
            JsonRpcMessage::Response { result, .. } => result["task"]["taskId"].as_str().unwrap().to_string(),
            other => panic!("unexpected: {other:?}"),
        };

        for _ in 0..20 {
            if let Some(task) = task_store.get(&task_id).await {
                if task.status == TaskStatus::Completed {
                    return;
                }
            }
            sleep(StdDuration::from_millis(10)).await;
        }
        panic!("task never completed");
    }

    #[tokio::test]
    async fn task_augmented_call_is_rejected_without_the_capability() {
        let (session, mut rx) = new_session();
        let registry = Arc::new(ToolRegistry::new().register(Arc::new(EchoTool)));
        register_tools(&session, registry, Arc::new(InMemoryTaskStore::new()), ServerCapabilities::default());

        session
            .dispatcher
            .dispatch_incoming(JsonRpcMessage::request(
                RequestId::Number(1),
                "tools/call",
                Some(serde_json::json!({"name": "echo", "arguments": {}, "task": {}})),
            ))
            .await;
        let wire = rx.recv().await.unwrap();
        assert!(matches!(
            serde_json::from_str::<JsonRpcMessage>(&wire).unwrap(),
            JsonRpcMessage::Error { .. }
        ));
    }
}
