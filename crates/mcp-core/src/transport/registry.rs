use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mcp_protocol::{Implementation, ServerCapabilities};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::session::Session;
use crate::tasks::TaskStore;
use crate::transport::event_store::{EventStore, StoredEvent};

/// Hook run once against every newly created session, before it is handed
/// to the first request. A demo/production server uses this to register its
/// `tools/list`, `tools/call`, and similar handlers onto the fresh session's
/// dispatcher — the registry itself knows nothing about tools.
pub type SessionInitializer = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;

/// A session plus the plumbing that turns its outbound writes into both a
/// durable, resumable event log and a live fanout for an open SSE GET.
pub struct HttpSession {
    pub session: Arc<Session>,
    pub live: broadcast::Sender<StoredEvent>,
    get_stream_open: AtomicBool,
    forward_task: JoinHandle<()>,
}

impl HttpSession {
    /// A session may have at most one open GET stream at a time: a second
    /// concurrent GET is rejected rather than queued or left to race the
    /// first. Returns `false` if a stream is already open.
    pub fn try_open_get_stream(&self) -> bool {
        self.get_stream_open.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn close_get_stream(&self) {
        self.get_stream_open.store(false, Ordering::Release);
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.forward_task.abort();
    }
}

impl HttpSession {
    fn new(
        server_capabilities: ServerCapabilities,
        server_info: Implementation,
        task_store: Arc<dyn TaskStore>,
        event_store: Arc<dyn EventStore>,
        initializer: Option<&SessionInitializer>,
    ) -> Arc<Self> {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let session = Session::with_task_store(outbound_tx, server_capabilities, server_info, task_store);
        if let Some(initializer) = initializer {
            initializer(&session);
        }
        let (live_tx, _) = broadcast::channel(256);

        let stream_id = session.id.clone();
        let live_tx_for_task = live_tx.clone();
        let forward_task = tokio::spawn(async move {
            while let Some(payload) = outbound_rx.recv().await {
                let stored = event_store.append(&stream_id, payload).await;
                let _ = live_tx_for_task.send(stored);
            }
        });

        Arc::new(Self {
            session,
            live: live_tx,
            get_stream_open: AtomicBool::new(false),
            forward_task,
        })
    }
}

/// Tracks one `HttpSession` per negotiated `mcp-session-id` (stateful mode).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<HttpSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        server_capabilities: ServerCapabilities,
        server_info: Implementation,
        task_store: Arc<dyn TaskStore>,
        event_store: Arc<dyn EventStore>,
        initializer: Option<&SessionInitializer>,
    ) -> Arc<HttpSession> {
        let http_session = HttpSession::new(server_capabilities, server_info, task_store, event_store, initializer);
        self.sessions
            .write()
            .await
            .insert(http_session.session.id.clone(), Arc::clone(&http_session));
        http_session
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<HttpSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<HttpSession>> {
        self.sessions.write().await.remove(session_id)
    }
}
