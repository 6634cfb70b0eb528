pub mod memory;
pub mod rest;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::task::{OwnerId, Task, TaskId, TaskPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("query rejected by the store: {0}")]
    BadQuery(String),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A live change-notification feed for one query. Each message is a full
/// replacement snapshot of the matching task list. Dropping the watch tears
/// the feed down.
pub struct TaskWatch {
    rx: mpsc::Receiver<Vec<Task>>,
    handle: JoinHandle<()>,
}

impl TaskWatch {
    pub fn new(rx: mpsc::Receiver<Vec<Task>>, handle: JoinHandle<()>) -> Self {
        Self { rx, handle }
    }

    /// Wait for the next snapshot. `None` means the feed ended.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a pending snapshot.
    pub fn try_next(&mut self) -> Option<Vec<Task>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for TaskWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The remote document collection the session works against: owner-scoped
/// queries, per-document writes, and snapshot streams per query.
#[allow(async_fn_in_trait)]
pub trait TaskStore: Send + Sync {
    /// Persist a new task; the store assigns and returns the real id.
    async fn create(&self, task: &Task) -> Result<TaskId, StoreError>;

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: TaskId) -> Result<(), StoreError>;

    /// Tasks due within the given calendar day, ordered by due ascending.
    async fn tasks_for_day(
        &self,
        owner: &OwnerId,
        day: NaiveDate,
    ) -> Result<Vec<Task>, StoreError>;

    /// All of the owner's tasks, any day (the fallback query).
    async fn tasks_for_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError>;

    /// Completed tasks only, ordered by due descending.
    async fn completed_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError>;

    /// Tasks whose exact text matches, for the duplicate guard.
    async fn find_by_text(&self, owner: &OwnerId, text: &str) -> Result<Vec<Task>, StoreError>;

    /// Snapshot stream for one calendar day's tasks.
    async fn watch_day(&self, owner: &OwnerId, day: NaiveDate) -> Result<TaskWatch, StoreError>;

    /// Snapshot stream for all of the owner's tasks (fallback stream).
    async fn watch_owner(&self, owner: &OwnerId) -> Result<TaskWatch, StoreError>;
}
