use std::time::Duration;

use crate::core::clock;
use crate::core::reminder::needs_reminder;
use crate::core::task::{OwnerId, Task, TaskPatch};
use crate::store::{StoreError, TaskStore};

/// Delivery seam for due-soon notices. The shipped notifier writes to the
/// journal; real transports (mail, push) live behind this trait outside the
/// crate.
pub trait ReminderNotifier: Send + Sync {
    fn notify(&self, task: &Task);
}

pub struct LogNotifier;

impl ReminderNotifier for LogNotifier {
    fn notify(&self, task: &Task) {
        log::info!(
            "reminder: \"{}\" is due at {}",
            task.text,
            task.due.format("%Y-%m-%d %H:%M")
        );
    }
}

/// Periodic scan that dispatches each due-soon reminder exactly once. The
/// sent flag is written back through the store, so a task never notifies
/// twice even across restarts.
pub struct ReminderSweeper<S, N> {
    store: S,
    notifier: N,
    cadence: Duration,
}

impl<S: TaskStore, N: ReminderNotifier> ReminderSweeper<S, N> {
    pub fn new(store: S, notifier: N, cadence: Duration) -> Self {
        Self {
            store,
            notifier,
            cadence,
        }
    }

    /// One pass over the given owners; returns how many reminders went out.
    pub async fn sweep(&self, owners: &[OwnerId]) -> Result<usize, StoreError> {
        let now = clock::now();
        let fetched = futures::future::try_join_all(
            owners.iter().map(|owner| self.store.tasks_for_owner(owner)),
        )
        .await?;

        let mut sent = 0;
        for task in fetched.into_iter().flatten() {
            if !needs_reminder(&task, now) {
                continue;
            }
            self.notifier.notify(&task);
            let patch = TaskPatch {
                reminder_sent: Some(true),
                ..Default::default()
            };
            match self.store.update(task.id, &patch).await {
                Ok(()) => sent += 1,
                // A vanished task just means nothing left to mark
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }

    /// Sweep on a fixed cadence forever. Failures are logged and the next
    /// tick retries from scratch.
    pub async fn run(&self, owners: Vec<OwnerId>) {
        let mut ticker = tokio::time::interval(self.cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sweep(&owners).await {
                Ok(0) => {}
                Ok(n) => log::info!("dispatched {n} reminder(s)"),
                Err(e) => log::warn!("reminder sweep failed: {e}"),
            }
        }
    }
}
