use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::auth::Identity;
use crate::core::task::{OwnerId, Task, TaskId, TaskPatch};
use crate::store::memory::MemoryStore;
use crate::store::{StoreError, TaskStore, TaskWatch};

pub fn identity() -> Identity {
    Identity::new("u1", "u1@example.com", true)
}

pub fn task_due(text: &str, day: NaiveDate, hour: u32) -> Task {
    Task::new(
        OwnerId::from("u1"),
        text,
        day.and_hms_opt(hour, 0, 0).unwrap(),
    )
}

/// A `MemoryStore` wrapper with failure injection: writes can be made to
/// fail or hang forever, `watch_day` can return a prepared error once, and
/// owner-wide fetches are counted.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
    hang_writes: Arc<AtomicBool>,
    watch_day_error: Arc<Mutex<Option<StoreError>>>,
    owner_fetches: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_writes: Arc::new(AtomicBool::new(false)),
            hang_writes: Arc::new(AtomicBool::new(false)),
            watch_day_error: Arc::new(Mutex::new(None)),
            owner_fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    async fn stall_if_hung(&self) {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    pub fn set_watch_day_error(&self, error: StoreError) {
        *self.watch_day_error.lock().unwrap() = Some(error);
    }

    pub fn owner_fetches(&self) -> usize {
        self.owner_fetches.load(Ordering::SeqCst)
    }

    fn write_error(&self) -> Option<StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Some(StoreError::Transport("injected write failure".into()))
        } else {
            None
        }
    }
}

impl TaskStore for FlakyStore {
    async fn create(&self, task: &Task) -> Result<TaskId, StoreError> {
        self.stall_if_hung().await;
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        self.inner.create(task).await
    }

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.stall_if_hung().await;
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        self.stall_if_hung().await;
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        self.inner.delete(id).await
    }

    async fn tasks_for_day(
        &self,
        owner: &OwnerId,
        day: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        self.inner.tasks_for_day(owner, day).await
    }

    async fn tasks_for_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        self.owner_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.tasks_for_owner(owner).await
    }

    async fn completed_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        self.inner.completed_tasks(owner).await
    }

    async fn find_by_text(&self, owner: &OwnerId, text: &str) -> Result<Vec<Task>, StoreError> {
        self.inner.find_by_text(owner, text).await
    }

    async fn watch_day(&self, owner: &OwnerId, day: NaiveDate) -> Result<TaskWatch, StoreError> {
        if let Some(e) = self.watch_day_error.lock().unwrap().take() {
            return Err(e);
        }
        self.inner.watch_day(owner, day).await
    }

    async fn watch_owner(&self, owner: &OwnerId) -> Result<TaskWatch, StoreError> {
        self.inner.watch_owner(owner).await
    }
}
