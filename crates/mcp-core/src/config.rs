use std::time::Duration;

/// Resource limits a runtime enforces across the sessions it hosts.
/// `None`/zero-like fields mean "unbounded" — the in-memory stores this
/// crate ships default to unbounded, matching a single-tenant demo server,
/// but a multi-tenant deployment should set all four.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Applied to a task's `ttl` when the caller's `task` params omit one.
    pub default_task_ttl: Duration,
    /// Caps the `ttl` a caller may request regardless of what it asks for.
    pub max_task_ttl: Duration,
    /// Total live (non-terminal, unswept) tasks a store will hold across all
    /// sessions before `create` starts failing with `TaskLimitExceeded`.
    pub max_tasks: Option<usize>,
    /// Same cap, scoped to one session.
    pub max_tasks_per_session: Option<usize>,
    /// Events an `EventStore` stream keeps before evicting the oldest.
    pub event_store_backlog: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_task_ttl: Duration::from_secs(60),
            max_task_ttl: Duration::from_secs(24 * 60 * 60),
            max_tasks: None,
            max_tasks_per_session: None,
            event_store_backlog: 256,
        }
    }
}
