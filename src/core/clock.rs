use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;

/// The one fixed civil zone (UTC+05:30) used for every calendar decision:
/// "is this due today", streak day-bucketing, and the past-date guard.
static ZONE: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap());

/// Current instant expressed in the fixed zone.
pub fn now() -> NaiveDateTime {
    Utc::now().with_timezone(&*ZONE).naive_local()
}

/// Today's calendar date in the fixed zone.
pub fn today() -> NaiveDate {
    now().date()
}

/// Midnight of the given calendar day.
pub fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

/// The calendar-day bucket a civil instant falls into.
pub fn day_key(at: NaiveDateTime) -> NaiveDate {
    at.date()
}

/// Inclusive bounds of a calendar day, matching the store's due-range query
/// (00:00 through 23:59:59). Covers the same instants as `day_key`, so the
/// range query and the client-side day filter always agree.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    (midnight(day), day.and_time(end))
}

/// Where a session date sits relative to today. Past days are read-only,
/// future days allow add/edit but no status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Past,
    Today,
    Future,
}

impl DayKind {
    pub fn classify(day: NaiveDate, today: NaiveDate) -> Self {
        if day < today {
            Self::Past
        } else if day > today {
            Self::Future
        } else {
            Self::Today
        }
    }
}
