use chrono::NaiveDate;
use thiserror::Error;

use crate::core::clock::{self, DayKind};
use crate::core::task::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
use crate::events::AppEvent;
use crate::store::{StoreError, TaskStore};

use super::SessionTasks;

#[derive(Debug, Error)]
pub enum MutateError {
    #[error("task text must not be empty")]
    EmptyText,
    #[error("due date is in the past")]
    PastDue,
    #[error("a task with the same text already exists on that day")]
    Duplicate,
    #[error("completed tasks can no longer be edited")]
    CompletedImmutable,
    #[error("status only moves forward")]
    InvalidTransition,
    #[error("status changes are only allowed on today's list")]
    NotToday,
    #[error("past days are read-only")]
    ReadOnlyDay,
    #[error("gratitude text is required to complete a task")]
    EmptyGratitude,
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    pub id: TaskId,
    /// Set when the task landed on a different day than the session date;
    /// `SwitchDate` has already been emitted with this day.
    pub switched_day: Option<NaiveDate>,
}

impl<S: TaskStore + Clone> SessionTasks<S> {
    /// Validate and write a new or edited task. Validation happens before
    /// any remote write: non-empty text, due not in the past, and the
    /// same-text/same-day duplicate guard. The local list is patched
    /// optimistically and rolled back if the write fails.
    pub async fn add_or_edit(&mut self, draft: TaskDraft) -> Result<MutationOutcome, MutateError> {
        if DayKind::classify(self.date, clock::today()) == DayKind::Past {
            return Err(MutateError::ReadOnlyDay);
        }

        let text = draft.text.trim().to_string();
        if text.is_empty() {
            return Err(MutateError::EmptyText);
        }
        if draft.due < clock::now() {
            return Err(MutateError::PastDue);
        }

        self.check_duplicate(&text, draft.due.date(), draft.id).await?;

        match draft.id {
            Some(id) => self.edit_task(id, text, &draft).await,
            None => self.create_task(text, &draft).await,
        }
    }

    /// Optimistic removal, then remote delete; the list is restored if the
    /// delete fails.
    pub async fn delete(&mut self, id: TaskId) -> Result<(), MutateError> {
        if DayKind::classify(self.date, clock::today()) == DayKind::Past {
            return Err(MutateError::ReadOnlyDay);
        }
        let pos = self.position(id)?;

        let before = self.tasks.clone();
        self.tasks.remove(pos);
        self.republish();

        let store = self.store.clone();
        self.guarded(before, async move { store.delete(id).await })
            .await
    }

    /// Direct forward status move (pending → ongoing), today only. Entering
    /// `Completed` is not allowed here: completion requires the gratitude
    /// note and goes through `complete`.
    pub async fn set_status(&mut self, id: TaskId, status: TaskStatus) -> Result<(), MutateError> {
        if self.date != clock::today() {
            return Err(MutateError::NotToday);
        }
        if status == TaskStatus::Completed {
            return Err(MutateError::EmptyGratitude);
        }
        let pos = self.position(id)?;
        if !self.tasks[pos].status.can_advance_to(status) {
            return Err(MutateError::InvalidTransition);
        }

        let patch = TaskPatch {
            status: Some(status),
            ..Default::default()
        };
        self.write_patch(pos, id, patch).await
    }

    /// Complete a task with its gratitude reflection, then ask the relay for
    /// feedback as a best-effort second step. A relay failure never fails or
    /// rolls back the completion itself.
    pub async fn complete(&mut self, id: TaskId, gratitude: &str) -> Result<(), MutateError> {
        if self.date != clock::today() {
            return Err(MutateError::NotToday);
        }
        let gratitude = gratitude.trim();
        if gratitude.is_empty() {
            return Err(MutateError::EmptyGratitude);
        }
        let pos = self.position(id)?;
        if !self.tasks[pos].status.can_advance_to(TaskStatus::Completed) {
            return Err(MutateError::InvalidTransition);
        }

        let task_text = self.tasks[pos].text.clone();
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            gratitude: Some(gratitude.to_string()),
            completed_at: Some(clock::now()),
            ..Default::default()
        };
        self.write_patch(pos, id, patch).await?;

        let relay = self.relay.clone();
        if let Some(relay) = relay {
            match relay.generate_reflection(&task_text, gratitude).await {
                Ok(feedback) if !feedback.trim().is_empty() => {
                    let patch = TaskPatch {
                        reflection_feedback: Some(feedback),
                        ..Default::default()
                    };
                    if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                        patch.apply(task);
                    }
                    if let Err(e) = self.store.update(id, &patch).await {
                        log::warn!("failed to store reflection feedback: {e}");
                    }
                    self.republish();
                }
                Ok(_) => {}
                Err(e) => log::warn!("reflection relay failed: {e}"),
            }
        }
        Ok(())
    }

    async fn create_task(
        &mut self,
        text: String,
        draft: &TaskDraft,
    ) -> Result<MutationOutcome, MutateError> {
        let mut task = Task::new(self.owner.clone(), text, draft.due);
        task.priority = draft.priority;
        task.reminder = draft.reminder.clone();

        let placeholder = task.id;
        let target_day = task.day();

        let before = self.tasks.clone();
        if target_day == self.date {
            self.tasks.push(task.clone());
            self.republish();
        }

        let store = self.store.clone();
        let to_create = task.clone();
        let id = self
            .guarded(before, async move { store.create(&to_create).await })
            .await?;

        // Swap the placeholder for the store-assigned id
        if let Some(local) = self.tasks.iter_mut().find(|t| t.id == placeholder) {
            local.id = id;
        }
        self.republish();

        Ok(MutationOutcome {
            id,
            switched_day: self.signal_cross_day(target_day),
        })
    }

    async fn edit_task(
        &mut self,
        id: TaskId,
        text: String,
        draft: &TaskDraft,
    ) -> Result<MutationOutcome, MutateError> {
        let pos = self.position(id)?;
        if !self.tasks[pos].is_editable() {
            return Err(MutateError::CompletedImmutable);
        }

        let patch = TaskPatch {
            text: Some(text),
            due: Some(draft.due),
            priority: Some(draft.priority),
            reminder: Some(draft.reminder.clone()),
            ..Default::default()
        };

        let before = self.tasks.clone();
        patch.apply(&mut self.tasks[pos]);
        let target_day = self.tasks[pos].day();
        if target_day != self.date {
            // Re-dated off the visible day
            self.tasks.remove(pos);
        }
        self.republish();

        let store = self.store.clone();
        let to_write = patch.clone();
        self.guarded(before, async move { store.update(id, &to_write).await })
            .await?;

        Ok(MutationOutcome {
            id,
            switched_day: self.signal_cross_day(target_day),
        })
    }

    /// Shared optimistic write for single-task patches.
    async fn write_patch(
        &mut self,
        pos: usize,
        id: TaskId,
        patch: TaskPatch,
    ) -> Result<(), MutateError> {
        let before = self.tasks.clone();
        patch.apply(&mut self.tasks[pos]);
        self.republish();

        let store = self.store.clone();
        let to_write = patch.clone();
        self.guarded(before, async move { store.update(id, &to_write).await })
            .await
    }

    fn position(&self, id: TaskId) -> Result<usize, MutateError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(MutateError::NotFound(id))
    }

    fn signal_cross_day(&self, target_day: NaiveDate) -> Option<NaiveDate> {
        if target_day != self.date {
            self.bus.emit(AppEvent::SwitchDate(target_day));
            Some(target_day)
        } else {
            None
        }
    }

    async fn check_duplicate(
        &self,
        text: &str,
        day: NaiveDate,
        editing: Option<TaskId>,
    ) -> Result<(), MutateError> {
        // Fast path: the visible cache already holds the target day
        if day == self.date && self.fetched_at.is_some() {
            if self
                .tasks
                .iter()
                .any(|t| t.duplicates(text, day) && editing != Some(t.id))
            {
                return Err(MutateError::Duplicate);
            }
            return Ok(());
        }

        // Cache miss: ask the store for same-text tasks and compare days
        let found = self.store.find_by_text(&self.owner, text).await?;
        if found
            .iter()
            .any(|t| t.day() == day && editing != Some(t.id))
        {
            return Err(MutateError::Duplicate);
        }
        Ok(())
    }
}
