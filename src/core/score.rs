use chrono::NaiveDate;
use std::collections::HashSet;

use super::task::Task;

/// Completion score and consecutive-day streak, derived from the owner's
/// completed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scoreboard {
    pub score: usize,
    pub streak: u32,
}

impl Scoreboard {
    /// Score is the total completed count across all days. Streak walks a day
    /// pointer backward from today: a day with at least one completion
    /// extends the run; an empty today is skipped rather than breaking it;
    /// the first empty earlier day ends the walk.
    pub fn compute(completed: &[Task], today: NaiveDate) -> Self {
        let done: Vec<&Task> = completed
            .iter()
            .filter(|t| t.status.is_completed())
            .collect();

        let days: HashSet<NaiveDate> = done.iter().map(|t| t.day()).collect();

        let mut streak = 0u32;
        let mut pointer = today;
        loop {
            if days.contains(&pointer) {
                streak += 1;
            } else if pointer != today {
                break;
            }
            match pointer.pred_opt() {
                Some(prev) => pointer = prev,
                None => break,
            }
        }

        Self {
            score: done.len(),
            streak,
        }
    }
}
