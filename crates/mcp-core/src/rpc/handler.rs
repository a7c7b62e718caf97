use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::rpc::cancellation::CancellationFlag;

/// A server-side handler for one inbound JSON-RPC method. `cancellation`
/// lets long-running handlers poll whether the caller asked to give up.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        params: Option<Value>,
        cancellation: CancellationFlag,
    ) -> Result<Value, McpCoreError>;
}

/// A server- or client-side handler for one inbound notification method.
/// Multiple handlers may be registered for the same method; all of them run,
/// and a handler's error is logged rather than reported back to the peer —
/// notifications have no response to carry it on.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> Result<(), McpCoreError>;
}

/// Adapts a plain async closure into a `RequestHandler`, for handlers that
/// don't need the cancellation flag.
pub struct FnRequestHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RequestHandler for FnRequestHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, McpCoreError>> + Send,
{
    async fn handle(&self, params: Option<Value>, _cancellation: CancellationFlag) -> Result<Value, McpCoreError> {
        (self.0)(params).await
    }
}

pub struct FnNotificationHandler<F>(pub F);

#[async_trait]
impl<F, Fut> NotificationHandler for FnNotificationHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), McpCoreError>> + Send,
{
    async fn handle(&self, params: Option<Value>) -> Result<(), McpCoreError> {
        (self.0)(params).await
    }
}
