use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::reminder::Reminder;

/// Opaque task identifier, assigned by the remote store on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// A locally generated id, used to tag an optimistic placeholder until
    /// the store assigns the real one.
    pub fn local() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The authenticated owner of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Ongoing,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ongoing" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Status moves forward only: pending → ongoing → completed, no way back.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        next > *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: OwnerId,
    pub text: String,
    pub due: NaiveDateTime,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gratitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_feedback: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn new(owner: OwnerId, text: impl Into<String>, due: NaiveDateTime) -> Self {
        Self {
            id: TaskId::local(),
            owner,
            text: text.into(),
            due,
            status: TaskStatus::Pending,
            priority: Priority::default(),
            reminder: None,
            reminder_sent: false,
            gratitude: None,
            reflection_feedback: None,
            created_at: super::clock::now(),
            completed_at: None,
        }
    }

    /// The calendar-day bucket this task belongs to.
    pub fn day(&self) -> NaiveDate {
        self.due.date()
    }

    /// Completed tasks are read-mostly: text/due/priority/reminder may no
    /// longer change.
    pub fn is_editable(&self) -> bool {
        !self.status.is_completed()
    }

    /// Duplicate guard: same trimmed text on the same calendar day.
    pub fn duplicates(&self, text: &str, day: NaiveDate) -> bool {
        self.text.trim() == text && self.day() == day
    }
}

/// Add/edit input from the presentation layer. `id` is set when editing.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub id: Option<TaskId>,
    pub text: String,
    pub due: NaiveDateTime,
    pub priority: Priority,
    pub reminder: Option<Reminder>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>, due: NaiveDateTime) -> Self {
        Self {
            id: None,
            text: text.into(),
            due,
            priority: Priority::default(),
            reminder: None,
        }
    }
}

/// Partial update written through to the store. Unset fields are left alone;
/// `reminder: Some(None)` clears the reminder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Option<Reminder>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gratitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent: Option<bool>,
}

impl TaskPatch {
    pub fn apply(&self, task: &mut Task) {
        if let Some(ref text) = self.text {
            task.text = text.clone();
        }
        if let Some(due) = self.due {
            task.due = due;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(ref reminder) = self.reminder {
            task.reminder = reminder.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(ref gratitude) = self.gratitude {
            task.gratitude = Some(gratitude.clone());
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = Some(completed_at);
        }
        if let Some(ref feedback) = self.reflection_feedback {
            task.reflection_feedback = Some(feedback.clone());
        }
        if let Some(sent) = self.reminder_sent {
            task.reminder_sent = sent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn due(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn status_moves_forward_only() {
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Ongoing));
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Completed));
        assert!(TaskStatus::Ongoing.can_advance_to(TaskStatus::Completed));
        assert!(!TaskStatus::Ongoing.can_advance_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_advance_to(TaskStatus::Ongoing));
        assert!(!TaskStatus::Completed.can_advance_to(TaskStatus::Completed));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Ongoing).unwrap(),
            "\"ongoing\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"completed\"").unwrap(),
            TaskStatus::Completed
        );
        assert_eq!(
            serde_json::to_string(&Priority::Urgent).unwrap(),
            "\"urgent\""
        );
    }

    #[test]
    fn duplicate_guard_trims_and_buckets_by_day() {
        let t = Task::new(OwnerId::from("u1"), "Draft report", due(15, 10));
        assert!(t.duplicates("Draft report", NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()));
        // Same text, different day: not a duplicate
        assert!(!t.duplicates("Draft report", NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()));
        // Different text, same day: not a duplicate
        assert!(!t.duplicates("Send report", NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()));
    }

    #[test]
    fn completed_tasks_are_not_editable() {
        let mut t = Task::new(OwnerId::from("u1"), "Water plants", due(15, 9));
        assert!(t.is_editable());
        t.status = TaskStatus::Completed;
        assert!(!t.is_editable());
    }

    #[test]
    fn patch_applies_set_fields_only() {
        let mut t = Task::new(OwnerId::from("u1"), "Old text", due(15, 9));
        let patch = TaskPatch {
            text: Some("New text".to_string()),
            status: Some(TaskStatus::Ongoing),
            ..Default::default()
        };
        patch.apply(&mut t);
        assert_eq!(t.text, "New text");
        assert_eq!(t.status, TaskStatus::Ongoing);
        assert_eq!(t.due, due(15, 9)); // untouched
        assert_eq!(t.priority, Priority::Medium);
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            gratitude: Some("Glad I finished early".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["gratitude"], "Glad I finished early");
        assert!(json.get("text").is_none());
        assert!(json.get("due").is_none());
    }
}
