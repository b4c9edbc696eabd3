//! Daily streak tracking on UTC calendar days.

use chrono::{DateTime, NaiveDate, Utc};

/// How a processed activity affected the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// First ever activity for the pair.
    Started,
    /// Previous activity was on the preceding UTC day.
    Continued,
    /// Previous activity was earlier today (or stamped in the future).
    SameDay,
    /// A gap of two or more UTC days broke the streak.
    Reset,
}

/// Next streak value given the last activity and the current streak.
pub fn advance(
    last_activity_at: Option<DateTime<Utc>>,
    streak_days: u32,
    now: DateTime<Utc>,
) -> (u32, StreakChange) {
    let Some(last) = last_activity_at else {
        return (1, StreakChange::Started);
    };

    match day_gap(last.date_naive(), now.date_naive()) {
        gap if gap <= 0 => (streak_days.max(1), StreakChange::SameDay),
        1 => (streak_days.saturating_add(1), StreakChange::Continued),
        _ => (1, StreakChange::Reset),
    }
}

fn day_gap(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
