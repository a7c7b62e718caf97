use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::rpc::{CancellationFlag, RequestHandler};

/// A middleware stage around a request handler: inspect or rewrite params
/// before the handler runs, and the result (success or error) after. Filters
/// compose outer-to-inner, the same order they're passed to `Pipeline::new`.
#[async_trait]
pub trait RequestFilter: Send + Sync {
    async fn before(&self, method: &str, params: Option<Value>) -> Result<Option<Value>, McpCoreError> {
        let _ = method;
        Ok(params)
    }

    async fn after(&self, method: &str, result: Result<Value, McpCoreError>) -> Result<Value, McpCoreError> {
        let _ = method;
        result
    }
}

/// Wraps a `RequestHandler` with an ordered chain of filters. Useful for
/// cross-cutting concerns (request logging, task-capability gating, auth)
/// that apply uniformly across tool/prompt/resource handlers without each
/// one repeating the boilerplate.
pub struct Pipeline {
    method: String,
    filters: Vec<Arc<dyn RequestFilter>>,
    inner: Arc<dyn RequestHandler>,
}

impl Pipeline {
    pub fn new(method: impl Into<String>, filters: Vec<Arc<dyn RequestFilter>>, inner: Arc<dyn RequestHandler>) -> Self {
        Self {
            method: method.into(),
            filters,
            inner,
        }
    }
}

#[async_trait]
impl RequestHandler for Pipeline {
    async fn handle(&self, params: Option<Value>, cancellation: CancellationFlag) -> Result<Value, McpCoreError> {
        let mut params = params;
        for filter in &self.filters {
            params = filter.before(&self.method, params).await?;
        }

        let mut result = self.inner.handle(params, cancellation).await;
        for filter in self.filters.iter().rev() {
            result = filter.after(&self.method, result).await;
        }
        result
    }
}

/// Logs the outcome of every request that passes through it. The one filter
/// every registered pipeline in this runtime carries.
pub struct RequestLogger;

#[async_trait]
impl RequestFilter for RequestLogger {
    async fn before(&self, method: &str, params: Option<Value>) -> Result<Option<Value>, McpCoreError> {
        tracing::debug!(method, "dispatching request");
        Ok(params)
    }

    async fn after(&self, method: &str, result: Result<Value, McpCoreError>) -> Result<Value, McpCoreError> {
        match &result {
            Ok(_) => tracing::debug!(method, "request completed"),
            Err(err) => tracing::warn!(method, error = %err, "request failed"),
        }
        result
    }
}
