use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::{broadcast, mpsc};

use crate::core::clock;
use crate::core::task::{OwnerId, Task, TaskId, TaskPatch};

use super::{StoreError, TaskStore, TaskWatch};

/// In-process document store with the same surface as the remote one. Backs
/// tests and local/dev mode; every write fans a change signal out to open
/// watches, which then push a fresh snapshot.
#[derive(Clone)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<TaskId, Task>>>,
    changed: broadcast::Sender<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(64);
        Self {
            docs: Arc::new(Mutex::new(HashMap::new())),
            changed,
        }
    }

    fn notify(&self) {
        let _ = self.changed.send(());
    }

    fn day_snapshot(docs: &HashMap<TaskId, Task>, owner: &OwnerId, day: NaiveDate) -> Vec<Task> {
        let (start, end) = clock::day_bounds(day);
        let mut tasks: Vec<Task> = docs
            .values()
            .filter(|t| t.owner == *owner && t.due >= start && t.due <= end)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.due);
        tasks
    }

    fn owner_snapshot(docs: &HashMap<TaskId, Task>, owner: &OwnerId) -> Vec<Task> {
        let mut tasks: Vec<Task> = docs
            .values()
            .filter(|t| t.owner == *owner)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.due);
        tasks
    }

    fn spawn_watch<F>(&self, snapshot: F) -> TaskWatch
    where
        F: Fn(&HashMap<TaskId, Task>) -> Vec<Task> + Send + 'static,
    {
        let docs = Arc::clone(&self.docs);
        let mut changed = self.changed.subscribe();
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            // Initial snapshot, then one per change signal.
            let current = snapshot(&docs.lock().unwrap());
            if tx.send(current).await.is_err() {
                return;
            }
            loop {
                match changed.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let current = snapshot(&docs.lock().unwrap());
                        if tx.send(current).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        TaskWatch::new(rx, handle)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore for MemoryStore {
    async fn create(&self, task: &Task) -> Result<TaskId, StoreError> {
        let id = TaskId::local();
        {
            let mut docs = self.docs.lock().unwrap();
            let mut stored = task.clone();
            stored.id = id;
            docs.insert(id, stored);
        }
        self.notify();
        Ok(id)
    }

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        {
            let mut docs = self.docs.lock().unwrap();
            let task = docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            patch.apply(task);
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        {
            let mut docs = self.docs.lock().unwrap();
            docs.remove(&id).ok_or(StoreError::NotFound(id))?;
        }
        self.notify();
        Ok(())
    }

    async fn tasks_for_day(
        &self,
        owner: &OwnerId,
        day: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(Self::day_snapshot(&self.docs.lock().unwrap(), owner, day))
    }

    async fn tasks_for_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        Ok(Self::owner_snapshot(&self.docs.lock().unwrap(), owner))
    }

    async fn completed_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        let docs = self.docs.lock().unwrap();
        let mut tasks: Vec<Task> = docs
            .values()
            .filter(|t| t.owner == *owner && t.status.is_completed())
            .cloned()
            .collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.due));
        Ok(tasks)
    }

    async fn find_by_text(&self, owner: &OwnerId, text: &str) -> Result<Vec<Task>, StoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .values()
            .filter(|t| t.owner == *owner && t.text == text)
            .cloned()
            .collect())
    }

    async fn watch_day(&self, owner: &OwnerId, day: NaiveDate) -> Result<TaskWatch, StoreError> {
        let owner = owner.clone();
        Ok(self.spawn_watch(move |docs| Self::day_snapshot(docs, &owner, day)))
    }

    async fn watch_owner(&self, owner: &OwnerId) -> Result<TaskWatch, StoreError> {
        let owner = owner.clone();
        Ok(self.spawn_watch(move |docs| Self::owner_snapshot(docs, &owner)))
    }
}
