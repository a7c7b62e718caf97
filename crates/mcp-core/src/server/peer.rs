use std::sync::Arc;

use mcp_protocol::{ClientCapabilities, RequestSchema};
use serde::Serialize;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::rpc::Dispatcher;
use crate::tasks::TaskExecutionContext;

/// Server-to-client calls a tool/prompt/resource handler can make mid-flight:
/// `sampling/createMessage`, `elicitation/create`, and `roots/list`. Each
/// checks the negotiated `ClientCapabilities` before sending, and the
/// sampling/elicitation calls auto-bracket the caller's task (if any)
/// through `InputRequired` for their duration.
pub struct Peer {
    dispatcher: Arc<Dispatcher>,
    client_capabilities: ClientCapabilities,
    execution_context: TaskExecutionContext,
    progress_token: Option<Value>,
}

#[derive(Serialize)]
struct ElicitCreateParams {
    message: String,
    #[serde(rename = "requestedSchema", skip_serializing_if = "Option::is_none")]
    requested_schema: Option<RequestSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl Peer {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        client_capabilities: ClientCapabilities,
        execution_context: TaskExecutionContext,
        progress_token: Option<Value>,
    ) -> Self {
        Self {
            dispatcher,
            client_capabilities,
            execution_context,
            progress_token,
        }
    }

    /// Sends a `notifications/progress` for the call's `progressToken`, if
    /// the request named one. A no-op that succeeds trivially otherwise,
    /// since progress reporting is always optional from the caller's side.
    pub fn send_progress(&self, progress: f64, total: Option<f64>) -> Result<(), McpCoreError> {
        let Some(progress_token) = self.progress_token.clone() else {
            return Ok(());
        };
        let mut params = serde_json::json!({
            "progressToken": progress_token,
            "progress": progress,
        });
        if let Some(total) = total {
            params["total"] = serde_json::json!(total);
        }
        self.dispatcher.notify("notifications/progress", Some(params))
    }

    pub async fn sample(&self, params: Value) -> Result<Value, McpCoreError> {
        if self.client_capabilities.sampling.is_none() {
            return Err(McpCoreError::Internal(
                "client did not advertise a sampling capability".to_string(),
            ));
        }
        self.execution_context
            .bracket_input_required(self.dispatcher.request("sampling/createMessage", Some(params)))
            .await
    }

    pub async fn elicit_form(&self, message: impl Into<String>, schema: RequestSchema) -> Result<Value, McpCoreError> {
        let form_supported = self
            .client_capabilities
            .elicitation
            .as_ref()
            .map(|e| e.form)
            .unwrap_or(false);
        if !form_supported {
            return Err(McpCoreError::Internal(
                "client did not advertise form elicitation support".to_string(),
            ));
        }
        let params = ElicitCreateParams {
            message: message.into(),
            requested_schema: Some(schema),
            url: None,
        };
        self.elicit(params).await
    }

    pub async fn elicit_url(&self, message: impl Into<String>, url: impl Into<String>) -> Result<Value, McpCoreError> {
        let url_supported = self
            .client_capabilities
            .elicitation
            .as_ref()
            .map(|e| e.url)
            .unwrap_or(false);
        if !url_supported {
            return Err(McpCoreError::UrlElicitationRequired);
        }
        let params = ElicitCreateParams {
            message: message.into(),
            requested_schema: None,
            url: Some(url.into()),
        };
        self.elicit(params).await
    }

    async fn elicit(&self, params: ElicitCreateParams) -> Result<Value, McpCoreError> {
        let value = serde_json::to_value(params).map_err(|e| McpCoreError::Internal(e.to_string()))?;
        self.execution_context
            .bracket_input_required(self.dispatcher.request("elicitation/create", Some(value)))
            .await
    }

    pub async fn request_roots(&self) -> Result<Value, McpCoreError> {
        if self.client_capabilities.roots.is_none() {
            return Err(McpCoreError::Internal(
                "client did not advertise a roots capability".to_string(),
            ));
        }
        self.dispatcher.request("roots/list", None).await
    }
}
