use std::future::Future;
use std::sync::Arc;

use crate::error::McpCoreError;
use crate::tasks::{TaskStatus, TaskStore};

tokio::task_local! {
    static CURRENT_TASK_ID: String;
}

/// Binds a `taskId` to the async flow executing a task-augmented request's
/// handler, so nested `Sample`/`Elicit` calls can find their way back to the
/// task record without threading it through every function signature.
#[derive(Clone)]
pub struct TaskExecutionContext {
    store: Arc<dyn TaskStore>,
}

impl TaskExecutionContext {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Runs `future` with `task_id` bound as the current task for its
    /// duration. Panics if called while a task is already bound — task
    /// execution flows do not nest.
    pub async fn scope<F, T>(&self, task_id: String, future: F) -> T
    where
        F: Future<Output = T>,
    {
        CURRENT_TASK_ID.scope(task_id, future).await
    }

    pub fn current_task_id() -> Option<String> {
        CURRENT_TASK_ID.try_with(|id| id.clone()).ok()
    }

    /// Brackets a nested `sampling/createMessage` or `elicitation/create`
    /// call: if a task is bound, moves it to `InputRequired` before `body`
    /// runs and back to `Working` afterward, regardless of outcome.
    pub async fn bracket_input_required<F, T>(&self, body: F) -> Result<T, McpCoreError>
    where
        F: Future<Output = Result<T, McpCoreError>>,
    {
        let Some(task_id) = Self::current_task_id() else {
            return body.await;
        };

        self.store
            .update_status(&task_id, TaskStatus::InputRequired, None)
            .await?;

        let result = body.await;

        // Best-effort: if the task was cancelled or completed out-of-band
        // while we awaited, leave its terminal status alone.
        let _ = self.store.update_status(&task_id, TaskStatus::Working, None).await;

        result
    }
}
