use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::task::Task;

/// Lead-time ahead of `due` at which a reminder fires. Stored on the wire as
/// either a preset label ("1hour", "1day", ...) or `{"minutes": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reminder {
    Preset(ReminderPreset),
    Custom { minutes: u32 },
    /// Label this build does not know. Kept verbatim so a round trip never
    /// loses it; the lead time falls back to one day.
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderPreset {
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "3hours")]
    ThreeHours,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "3days")]
    ThreeDays,
    #[serde(rename = "1week")]
    OneWeek,
}

impl ReminderPreset {
    pub fn minutes(&self) -> u32 {
        match self {
            Self::OneHour => 60,
            Self::ThreeHours => 180,
            Self::OneDay => 1440,
            Self::ThreeDays => 4320,
            Self::OneWeek => 10080,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneHour => "1 hour before",
            Self::ThreeHours => "3 hours before",
            Self::OneDay => "1 day before",
            Self::ThreeDays => "3 days before",
            Self::OneWeek => "1 week before",
        }
    }
}

impl Reminder {
    pub fn lead_minutes(&self) -> u32 {
        match self {
            Self::Preset(p) => p.minutes(),
            Self::Custom { minutes } => *minutes,
            Self::Unknown(_) => 1440,
        }
    }
}

/// Whether a reminder should be dispatched for this task right now: the task
/// is still active, no reminder has gone out yet, and `now` falls inside the
/// lead window `[due - lead, due)`.
pub fn needs_reminder(task: &Task, now: NaiveDateTime) -> bool {
    if task.status.is_completed() || task.reminder_sent {
        return false;
    }
    let Some(ref reminder) = task.reminder else {
        return false;
    };
    let window_start = task.due - Duration::minutes(i64::from(reminder.lead_minutes()));
    now >= window_start && now < task.due
}
