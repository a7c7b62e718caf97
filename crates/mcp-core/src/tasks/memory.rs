use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::McpCoreError;
use crate::tasks::{McpTask, TaskStatus, TaskStore};

struct Entry {
    task: McpTask,
    result: Option<Value>,
}

/// In-memory `TaskStore`: an `Arc<Mutex<HashMap<...>>>` of task entries plus
/// a background sweep task, spawned and kept by its `JoinHandle`, that
/// evicts expired terminal tasks.
pub struct InMemoryTaskStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    sweeper: Option<JoinHandle<()>>,
    config: RuntimeConfig,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweeper: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Applies resource limits (`max_tasks`, `max_tasks_per_session`,
    /// `max_task_ttl`) to every task this store accepts afterward.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawns a background task that evicts expired, terminal tasks every
    /// `interval`. Call at most once; a second call replaces the handle and
    /// the prior sweeper is aborted on drop.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        let entries = Arc::clone(&self.entries);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                let mut guard = entries.lock().await;
                guard.retain(|_, entry| !entry.task.is_expired(now));
            }
        });
        self.sweeper = Some(handle);
        self
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryTaskStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        session_id: Option<String>,
        ttl: Duration,
        poll_interval: Option<Duration>,
    ) -> Result<McpTask, McpCoreError> {
        let mut guard = self.entries.lock().await;

        if let Some(max_tasks) = self.config.max_tasks {
            if guard.len() >= max_tasks {
                return Err(McpCoreError::TaskLimitExceeded(format!(
                    "server is already tracking its configured maximum of {max_tasks} tasks"
                )));
            }
        }
        if let (Some(max_per_session), Some(session_id)) = (self.config.max_tasks_per_session, session_id.as_deref()) {
            let in_session = guard
                .values()
                .filter(|e| e.task.session_id.as_deref() == Some(session_id))
                .count();
            if in_session >= max_per_session {
                return Err(McpCoreError::TaskLimitExceeded(format!(
                    "session {session_id} is already tracking its configured maximum of {max_per_session} tasks"
                )));
            }
        }

        let now = Utc::now();
        let task = McpTask {
            task_id: Uuid::new_v4().to_string(),
            session_id,
            status: TaskStatus::Working,
            status_message: None,
            created_at: now,
            last_updated_at: now,
            ttl: ttl.min(self.config.max_task_ttl),
            poll_interval,
        };
        guard.insert(
            task.task_id.clone(),
            Entry {
                task: task.clone(),
                result: None,
            },
        );
        Ok(task)
    }

    async fn get(&self, task_id: &str) -> Option<McpTask> {
        self.entries.lock().await.get(task_id).map(|e| e.task.clone())
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<McpTask, McpCoreError> {
        let mut guard = self.entries.lock().await;
        let entry = guard
            .get_mut(task_id)
            .ok_or_else(|| McpCoreError::TaskNotFound(task_id.to_string()))?;

        if !entry.task.status.can_transition_to(status) {
            return Err(McpCoreError::InvalidTaskTransition {
                task_id: task_id.to_string(),
                from: entry.task.status,
                to: status,
            });
        }

        entry.task.status = status;
        entry.task.status_message = message;
        entry.task.last_updated_at = Utc::now();
        Ok(entry.task.clone())
    }

    async fn store_result(&self, task_id: &str, terminal_status: TaskStatus, result: Value) -> Result<(), McpCoreError> {
        let mut guard = self.entries.lock().await;
        let entry = guard
            .get_mut(task_id)
            .ok_or_else(|| McpCoreError::TaskNotFound(task_id.to_string()))?;

        if entry.task.status.is_terminal() {
            return Err(McpCoreError::InvalidTaskTransition {
                task_id: task_id.to_string(),
                from: entry.task.status,
                to: terminal_status,
            });
        }

        entry.task.status = terminal_status;
        entry.task.last_updated_at = Utc::now();
        entry.result = Some(result);
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<Value, McpCoreError> {
        let guard = self.entries.lock().await;
        let entry = guard
            .get(task_id)
            .ok_or_else(|| McpCoreError::TaskNotFound(task_id.to_string()))?;
        entry
            .result
            .clone()
            .ok_or_else(|| McpCoreError::TaskNotFound(task_id.to_string()))
    }

    async fn list(&self) -> Vec<McpTask> {
        self.entries.lock().await.values().map(|e| e.task.clone()).collect()
    }

    async fn cancel(&self, task_id: &str) -> Result<McpTask, McpCoreError> {
        let mut guard = self.entries.lock().await;
        let entry = guard
            .get_mut(task_id)
            .ok_or_else(|| McpCoreError::TaskNotFound(task_id.to_string()))?;

        if entry.task.status.is_terminal() {
            return Ok(entry.task.clone());
        }

        entry.task.status = TaskStatus::Cancelled;
        entry.task.last_updated_at = Utc::now();
        Ok(entry.task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        let fetched = store.get(&task.task_id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Working);
    }

    #[tokio::test]
    async fn working_to_completed_is_allowed_but_terminal_is_final() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        store
            .update_status(&task.task_id, TaskStatus::Completed, None)
            .await
            .unwrap();
        let err = store
            .update_status(&task.task_id, TaskStatus::Working, None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpCoreError::InvalidTaskTransition { .. }));
    }

    #[tokio::test]
    async fn input_required_can_return_to_working() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        store
            .update_status(&task.task_id, TaskStatus::InputRequired, None)
            .await
            .unwrap();
        let back = store
            .update_status(&task.task_id, TaskStatus::Working, None)
            .await
            .unwrap();
        assert_eq!(back.status, TaskStatus::Working);
    }

    #[tokio::test]
    async fn cancelling_a_terminal_task_is_an_idempotent_no_op() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        store
            .update_status(&task.task_id, TaskStatus::Failed, None)
            .await
            .unwrap();
        let cancelled = store.cancel(&task.task_id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn store_result_fails_once_the_task_is_already_terminal() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        store
            .store_result(&task.task_id, TaskStatus::Completed, serde_json::json!({"first": true}))
            .await
            .unwrap();
        let err = store
            .store_result(&task.task_id, TaskStatus::Completed, serde_json::json!({"second": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpCoreError::InvalidTaskTransition { .. }));
        assert_eq!(
            store.get_result(&task.task_id).await.unwrap(),
            serde_json::json!({"first": true})
        );
    }

    #[tokio::test]
    async fn result_is_only_available_after_storing() {
        let store = InMemoryTaskStore::new();
        let task = store.create(None, Duration::from_secs(60), None).await.unwrap();
        assert!(store.get_result(&task.task_id).await.is_err());
        store
            .store_result(&task.task_id, TaskStatus::Completed, serde_json::json!({"ok": true}))
            .await
            .unwrap();
        assert_eq!(store.get_result(&task.task_id).await.unwrap(), serde_json::json!({"ok": true}));
        assert_eq!(store.get(&task.task_id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_task_id_is_not_found() {
        let store = InMemoryTaskStore::new();
        assert!(store.get("missing").await.is_none());
        assert!(matches!(
            store.update_status("missing", TaskStatus::Completed, None).await,
            Err(McpCoreError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_fails_once_the_global_task_limit_is_reached() {
        let store = InMemoryTaskStore::new().with_config(RuntimeConfig {
            max_tasks: Some(1),
            ..RuntimeConfig::default()
        });
        store.create(None, Duration::from_secs(60), None).await.unwrap();
        let err = store.create(None, Duration::from_secs(60), None).await.unwrap_err();
        assert!(matches!(err, McpCoreError::TaskLimitExceeded(_)));
    }

    #[tokio::test]
    async fn create_fails_once_a_sessions_task_limit_is_reached() {
        let store = InMemoryTaskStore::new().with_config(RuntimeConfig {
            max_tasks_per_session: Some(1),
            ..RuntimeConfig::default()
        });
        store
            .create(Some("session-a".into()), Duration::from_secs(60), None)
            .await
            .unwrap();
        let err = store
            .create(Some("session-a".into()), Duration::from_secs(60), None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpCoreError::TaskLimitExceeded(_)));

        // A different session is unaffected by session-a's limit.
        store
            .create(Some("session-b".into()), Duration::from_secs(60), None)
            .await
            .unwrap();
    }
}
