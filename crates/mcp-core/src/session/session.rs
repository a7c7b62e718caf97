use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use mcp_protocol::{ClientCapabilities, Implementation, ServerCapabilities};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::error::McpCoreError;
use crate::rpc::{Dispatcher, FnNotificationHandler, FnRequestHandler};
use crate::session::handshake::{InitializeParams, InitializeResult, PROTOCOL_VERSION};
use crate::session::log_level::LogLevel;
use crate::tasks::{InMemoryTaskStore, TaskExecutionContext, TaskStore};

#[derive(Debug, Default)]
struct Negotiated {
    client_capabilities: Option<ClientCapabilities>,
    client_info: Option<Implementation>,
}

/// One client connection's worth of protocol state: the dispatcher it talks
/// through, the capability negotiation outcome, the active log threshold,
/// and the task subsystem bound to this session's flows.
pub struct Session {
    pub id: String,
    pub dispatcher: Arc<Dispatcher>,
    pub task_store: Arc<dyn TaskStore>,
    pub execution_context: TaskExecutionContext,
    negotiated: RwLock<Negotiated>,
    initialized: AtomicBool,
    log_level: RwLock<LogLevel>,
}

impl Session {
    /// Builds a session wired with the built-in handlers every MCP server
    /// must answer regardless of which tools/prompts/resources it adds:
    /// `initialize`, `ping`, `logging/setLevel`, and `notifications/initialized`.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        server_capabilities: ServerCapabilities,
        server_info: Implementation,
    ) -> Arc<Self> {
        Self::with_task_store(
            outbound,
            server_capabilities,
            server_info,
            Arc::new(InMemoryTaskStore::new()),
        )
    }

    pub fn with_task_store(
        outbound: mpsc::UnboundedSender<String>,
        server_capabilities: ServerCapabilities,
        server_info: Implementation,
        task_store: Arc<dyn TaskStore>,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new(outbound));
        let execution_context = TaskExecutionContext::new(Arc::clone(&task_store));

        let session = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            dispatcher: Arc::clone(&dispatcher),
            task_store,
            execution_context,
            negotiated: RwLock::new(Negotiated::default()),
            initialized: AtomicBool::new(false),
            log_level: RwLock::new(LogLevel::default()),
        });

        session.register_builtins(server_capabilities, server_info);
        session
    }

    fn register_builtins(self: &Arc<Self>, server_capabilities: ServerCapabilities, server_info: Implementation) {
        let this = Arc::clone(self);
        self.dispatcher.on_request(
            "initialize",
            Arc::new(FnRequestHandler(move |params| {
                let this = Arc::clone(&this);
                let server_capabilities = server_capabilities.clone();
                let server_info = server_info.clone();
                async move { this.handle_initialize(params, server_capabilities, server_info).await }
            })),
        );

        self.dispatcher.on_request(
            "ping",
            Arc::new(FnRequestHandler(|_params| async { Ok(serde_json::json!({})) })),
        );

        let this = Arc::clone(self);
        self.dispatcher.on_request(
            "logging/setLevel",
            Arc::new(FnRequestHandler(move |params| {
                let this = Arc::clone(&this);
                async move { this.handle_set_level(params).await }
            })),
        );

        let this = Arc::clone(self);
        self.dispatcher.on_notification(
            "notifications/initialized",
            Arc::new(FnNotificationHandler(move |_params| {
                let this = Arc::clone(&this);
                async move {
                    this.initialized.store(true, Ordering::SeqCst);
                    info!(session_id = %this.id, "session initialized");
                    Ok(())
                }
            })),
        );
    }

    async fn handle_initialize(
        &self,
        params: Option<Value>,
        server_capabilities: ServerCapabilities,
        server_info: Implementation,
    ) -> Result<Value, McpCoreError> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value).map_err(|e| McpCoreError::InvalidParams {
                method: "initialize".to_string(),
                reason: e.to_string(),
            })?,
            None => {
                return Err(McpCoreError::InvalidParams {
                    method: "initialize".to_string(),
                    reason: "missing params".to_string(),
                })
            }
        };

        if params.protocol_version != PROTOCOL_VERSION {
            info!(
                requested = %params.protocol_version,
                advertised = %PROTOCOL_VERSION,
                "client proposed a protocol version this runtime doesn't recognize; advertising our own instead of failing the handshake"
            );
        }

        {
            let mut negotiated = self.negotiated.write().unwrap();
            negotiated.client_capabilities = Some(params.capabilities);
            negotiated.client_info = Some(params.client_info);
        }

        let result = InitializeResult::new(server_capabilities, server_info);
        Ok(serde_json::to_value(result).map_err(|e| McpCoreError::Internal(e.to_string()))?)
    }

    async fn handle_set_level(&self, params: Option<Value>) -> Result<Value, McpCoreError> {
        let level_value = params
            .as_ref()
            .and_then(|p| p.get("level"))
            .cloned()
            .ok_or_else(|| McpCoreError::InvalidParams {
                method: "logging/setLevel".to_string(),
                reason: "missing level".to_string(),
            })?;
        let level: LogLevel = serde_json::from_value(level_value).map_err(|e| McpCoreError::InvalidParams {
            method: "logging/setLevel".to_string(),
            reason: e.to_string(),
        })?;
        *self.log_level.write().unwrap() = level;
        Ok(serde_json::json!({}))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.negotiated.read().unwrap().client_capabilities.clone()
    }

    pub fn log_level(&self) -> LogLevel {
        *self.log_level.read().unwrap()
    }

    /// Whether a `notifications/message` at `level` should be emitted given
    /// the currently configured threshold.
    pub fn should_log(&self, level: LogLevel) -> bool {
        self.log_level().permits(level)
    }
}
