//! Durable task subsystem: the `McpTask` status machine, the `TaskStore`
//! contract, an in-memory implementation with TTL sweeping, and the
//! flow-local `TaskExecutionContext` that lets `Sample`/`Elicit` helpers
//! auto-bracket a task's status around a nested request.

mod context;
mod memory;
mod store;

pub use context::TaskExecutionContext;
pub use memory::InMemoryTaskStore;
pub use store::TaskStore;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status machine:
/// `Working -> {InputRequired, Completed, Failed, Cancelled}`,
/// `InputRequired -> {Working, Completed, Failed, Cancelled}`,
/// terminal states have no outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Working,
    InputRequired,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Working, InputRequired | Completed | Failed | Cancelled)
                | (InputRequired, Working | Completed | Failed | Cancelled)
        )
    }
}

/// A task's bookkeeping record, independent of its eventual result payload.
/// Results are stored and fetched separately via
/// `TaskStore::store_result`/`get_result` so a task's status can be polled
/// cheaply without paying for the (possibly large) result body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTask {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(with = "mcp_protocol::duration::millis")]
    pub ttl: Duration,
    #[serde(default, with = "mcp_protocol::duration::millis_opt")]
    pub poll_interval: Option<Duration>,
}

impl McpTask {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_terminal()
            && now.signed_duration_since(self.last_updated_at)
                > chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
    }
}
