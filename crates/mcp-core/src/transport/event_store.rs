use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// One durable entry on a resumable SSE stream: a monotonic id (the wire's
/// `id:` field) and the serialized JSON-RPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: u64,
    pub payload: String,
}

/// Per-stream append log backing GET-stream resumption via `Last-Event-ID`:
/// a backlog queue plus a monotonic event-id counter per session stream.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, stream_id: &str, payload: String) -> StoredEvent;

    /// Events strictly after `last_event_id`, oldest first.
    ///
    /// Returns `None` when the backlog has evicted past `last_event_id`: the
    /// gap can't be filled, and a client that resumes from a truncated
    /// replay would silently miss messages, so the caller must restart the
    /// session instead. `last_event_id == 0` ("replay from the start of
    /// whatever's left") never triggers this — there's no prior position to
    /// have expired. An unrecognized `stream_id` yields `Some(vec![])`,
    /// distinct from truncation: the stream was never forgotten, it just
    /// never existed (or was explicitly `forget`-ten), so there was never
    /// anything the client could have missed.
    async fn replay_since(&self, stream_id: &str, last_event_id: u64) -> Option<Vec<StoredEvent>>;

    async fn forget(&self, stream_id: &str);
}

struct Stream {
    next_id: AtomicU64,
    backlog: Mutex<VecDeque<StoredEvent>>,
    /// The id of the most recent event evicted from `backlog`, or 0 if
    /// nothing has been evicted yet.
    evicted_up_to: AtomicU64,
}

impl Stream {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            backlog: Mutex::new(VecDeque::new()),
            evicted_up_to: AtomicU64::new(0),
        }
    }
}

/// In-memory `EventStore`, capped per stream so a long-lived GET connection
/// that's never resumed doesn't grow the backlog without bound.
pub struct InMemoryEventStore {
    streams: Mutex<HashMap<String, Arc<Stream>>>,
    max_backlog: usize,
}

impl InMemoryEventStore {
    pub fn new(max_backlog: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            max_backlog,
        }
    }

    async fn stream_for(&self, stream_id: &str) -> Arc<Stream> {
        let mut streams = self.streams.lock().await;
        Arc::clone(streams.entry(stream_id.to_string()).or_insert_with(|| Arc::new(Stream::new())))
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, stream_id: &str, payload: String) -> StoredEvent {
        let stream = self.stream_for(stream_id).await;
        let event = StoredEvent {
            id: stream.next_id.fetch_add(1, Ordering::SeqCst),
            payload,
        };
        let mut backlog = stream.backlog.lock().await;
        backlog.push_back(event.clone());
        while backlog.len() > self.max_backlog {
            if let Some(evicted) = backlog.pop_front() {
                stream.evicted_up_to.store(evicted.id, Ordering::SeqCst);
            }
        }
        event
    }

    async fn replay_since(&self, stream_id: &str, last_event_id: u64) -> Option<Vec<StoredEvent>> {
        let streams = self.streams.lock().await;
        let Some(stream) = streams.get(stream_id) else {
            return Some(Vec::new());
        };

        let evicted_up_to = stream.evicted_up_to.load(Ordering::SeqCst);
        if last_event_id != 0 && last_event_id < evicted_up_to {
            return None;
        }

        let result = stream
            .backlog
            .lock()
            .await
            .iter()
            .filter(|event| event.id > last_event_id)
            .cloned()
            .collect();
        Some(result)
    }

    async fn forget(&self, stream_id: &str) {
        self.streams.lock().await.remove(stream_id);
    }
}
