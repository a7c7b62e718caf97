use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpCoreError;
use crate::tasks::{McpTask, TaskStatus};

/// Persistence contract for the task subsystem. Implementations need not be
/// literally durable across process restarts — the contract only
/// requires that every method observes a consistent, race-free view of a
/// task's lifecycle.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fails with `McpCoreError::TaskLimitExceeded` if a configured
    /// `max_tasks`/`max_tasks_per_session` limit is already at capacity.
    async fn create(
        &self,
        session_id: Option<String>,
        ttl: Duration,
        poll_interval: Option<Duration>,
    ) -> Result<McpTask, McpCoreError>;

    async fn get(&self, task_id: &str) -> Option<McpTask>;

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<McpTask, McpCoreError>;

    /// Atomically stores a task's terminal result and transitions it to
    /// `terminal_status` in one step, so a concurrent `cancel` can't land
    /// between "store the result" and "mark it done". Fails if the task is
    /// already terminal.
    async fn store_result(&self, task_id: &str, terminal_status: TaskStatus, result: Value) -> Result<(), McpCoreError>;

    async fn get_result(&self, task_id: &str) -> Result<Value, McpCoreError>;

    async fn list(&self) -> Vec<McpTask>;

    /// Moves a non-terminal task to `Cancelled`. Idempotent: cancelling a
    /// task that's already terminal is a no-op that returns its current
    /// state rather than an error, since cancellation always races
    /// completion and the caller can't tell which one won.
    async fn cancel(&self, task_id: &str) -> Result<McpTask, McpCoreError>;
}
