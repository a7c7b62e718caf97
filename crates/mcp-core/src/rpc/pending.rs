use std::collections::HashMap;
use std::sync::Arc;

use mcp_protocol::RequestId;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::error::McpCoreError;

/// Outcome of a request this runtime sent to the peer and is awaiting a
/// response for.
pub type PendingResult = Result<Value, McpCoreError>;

/// Map of in-flight outbound requests to the oneshot sender that will wake
/// their caller, keyed by the string-or-integer wire id.
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<HashMap<RequestId, oneshot::Sender<PendingResult>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: RequestId) -> oneshot::Receiver<PendingResult> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().await.insert(id, tx);
        rx
    }

    /// Resolves a pending request, dropping it from the map. Returns `false`
    /// if no caller is waiting on `id` (already resolved, or never sent by
    /// this side — a stray response from the peer).
    pub async fn resolve(&self, id: &RequestId, result: PendingResult) -> bool {
        if let Some(tx) = self.inner.lock().await.remove(id) {
            let _ = tx.send(result);
            true
        } else {
            false
        }
    }

    pub async fn cancel(&self, id: &RequestId) {
        self.resolve(id, Err(McpCoreError::Cancelled(id.clone()))).await;
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
