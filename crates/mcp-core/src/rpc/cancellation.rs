use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mcp_protocol::RequestId;
use tokio::sync::Mutex;

/// Cooperative cancellation for inbound requests this runtime is currently
/// handling. `notifications/cancelled` flips the flag a handler was handed
/// at dispatch time; handlers that poll long-running work check it between
/// steps. This runtime has no way to preempt a handler that never checks
/// its flag — cancellation here is advisory, not forcible.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    flags: Arc<Mutex<HashMap<RequestId, Arc<AtomicBool>>>>,
}

/// A handle a handler can poll to learn whether its request was cancelled.
#[derive(Clone)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: RequestId) -> CancellationFlag {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.lock().await.insert(id, Arc::clone(&flag));
        CancellationFlag(flag)
    }

    pub async fn unregister(&self, id: &RequestId) {
        self.flags.lock().await.remove(id);
    }

    /// Handles an inbound `notifications/cancelled` for `id`. A no-op if the
    /// request already finished or was never registered.
    pub async fn cancel(&self, id: &RequestId) {
        if let Some(flag) = self.flags.lock().await.get(id) {
            flag.store(true, Ordering::Release);
        }
    }
}
