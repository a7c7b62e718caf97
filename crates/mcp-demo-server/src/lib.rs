pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mcp_core::server::{register_task_endpoints, register_tools, ToolRegistry};
use mcp_core::tasks::InMemoryTaskStore;
use mcp_core::transport::{router, StreamableHttpState};
use mcp_core::RuntimeConfig;
use mcp_protocol::{Implementation, ServerCapabilities, ServerTasksCapability, TaskAugmentedRequests, ToolsCapability};

use crate::tools::{ChooseColorTool, EchoTool, SlowCountTool};

pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        tools: Some(ToolsCapability { list_changed: false }),
        tasks: Some(ServerTasksCapability {
            requests: TaskAugmentedRequests {
                tools_call: true,
                sampling_create_message: false,
                elicitation_create: false,
            },
            list: true,
            cancel: true,
        }),
        ..Default::default()
    }
}

/// Builds the full Streamable HTTP app: echo/slow_count/choose_color tools
/// plus task polling, wired onto every session as it's created.
pub fn build_app() -> Router {
    let server_info = Implementation {
        name: "mcp-demo-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let capabilities = server_capabilities();
    let task_config = RuntimeConfig {
        max_tasks_per_session: Some(50),
        ..RuntimeConfig::default()
    };
    let task_store = Arc::new(
        InMemoryTaskStore::new()
            .with_config(task_config)
            .with_sweep_interval(Duration::from_secs(30)),
    );

    let tool_registry = Arc::new(
        ToolRegistry::new()
            .register(Arc::new(EchoTool))
            .register(Arc::new(SlowCountTool))
            .register(Arc::new(ChooseColorTool)),
    );

    let state = StreamableHttpState::new(capabilities.clone(), server_info, task_store.clone());
    let state = state.with_session_initializer(move |session| {
        register_tools(session, Arc::clone(&tool_registry), task_store.clone(), capabilities.clone());
        register_task_endpoints(session, task_store.clone(), capabilities.clone());
    });

    router(state)
}
