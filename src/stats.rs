//! Derived statistics shown on the profile panel.

use crate::model::DiaryEntry;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Summary numbers for one identity's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiaryStats {
    pub total: usize,
    pub this_month: usize,
    pub current_streak: u32,
}

impl DiaryStats {
    pub fn compute(entries: &[DiaryEntry], today: NaiveDate) -> Self {
        Self {
            total: entries.len(),
            this_month: entries_this_month(entries, today),
            current_streak: current_streak(entries, today),
        }
    }
}

/// Consecutive days with at least one entry, walking back from the newest
/// entry date.
///
/// The streak is zero unless the newest entry is dated today or yesterday.
/// Several entries on one day count once.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use spacediary::stats::streak_from_dates;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
/// assert_eq!(streak_from_dates([d(10), d(9), d(8)], d(10)), 3);
/// assert_eq!(streak_from_dates([d(10), d(7)], d(10)), 1);
/// assert_eq!(streak_from_dates([d(8)], d(10)), 0);
/// ```
pub fn streak_from_dates<I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let distinct: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let mut newest_first = distinct.into_iter().rev();

    let Some(newest) = newest_first.next() else {
        return 0;
    };
    if newest != today && newest != today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    let mut expected = newest - Duration::days(1);
    for date in newest_first {
        if date != expected {
            break;
        }
        streak += 1;
        expected = date - Duration::days(1);
    }
    streak
}

pub fn current_streak(entries: &[DiaryEntry], today: NaiveDate) -> u32 {
    streak_from_dates(entries.iter().map(|e| e.date), today)
}

/// Entries dated in the same calendar month as `today`.
pub fn entries_this_month(entries: &[DiaryEntry], today: NaiveDate) -> usize {
    entries
        .iter()
        .filter(|e| e.date.year() == today.year() && e.date.month() == today.month())
        .count()
}

/// Human wording for how long ago `created` was.
pub fn relative_time(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - created).num_days();
    match days {
        d if d <= 0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 30 => format!("{} weeks ago", d / 7),
        d => format!("{} months ago", d / 30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mood;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn entry_on(date: NaiveDate) -> DiaryEntry {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        DiaryEntry {
            id: format!("e-{}", date),
            user_id: "u1".to_string(),
            date,
            title: "t".to_string(),
            mood: Mood::Neutral,
            content: "c".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let entries = vec![entry_on(day(15)), entry_on(day(14)), entry_on(day(13))];
        assert_eq!(current_streak(&entries, day(15)), 3);
    }

    #[test]
    fn test_streak_stops_at_gap() {
        let entries = vec![entry_on(day(15)), entry_on(day(12))];
        assert_eq!(current_streak(&entries, day(15)), 1);
    }

    #[test]
    fn test_streak_empty_is_zero() {
        assert_eq!(current_streak(&[], day(15)), 0);
    }

    #[test]
    fn test_streak_zero_when_newest_is_stale() {
        let entries = vec![entry_on(day(13)), entry_on(day(12))];
        assert_eq!(current_streak(&entries, day(15)), 0);
    }

    #[test]
    fn test_streak_may_start_yesterday() {
        let entries = vec![entry_on(day(14)), entry_on(day(13))];
        assert_eq!(current_streak(&entries, day(15)), 2);
    }

    #[test]
    fn test_streak_ignores_duplicate_dates_and_order() {
        let entries = vec![
            entry_on(day(13)),
            entry_on(day(15)),
            entry_on(day(15)),
            entry_on(day(14)),
        ];
        assert_eq!(current_streak(&entries, day(15)), 3);
    }

    #[test]
    fn test_streak_crosses_month_boundary() {
        let feb_29 = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let entries = vec![entry_on(day(1)), entry_on(feb_29)];
        assert_eq!(current_streak(&entries, day(1)), 2);
    }

    #[test]
    fn test_entries_this_month() {
        let entries = vec![
            entry_on(day(1)),
            entry_on(day(20)),
            entry_on(NaiveDate::from_ymd_opt(2024, 2, 20).unwrap()),
            entry_on(NaiveDate::from_ymd_opt(2023, 3, 20).unwrap()),
        ];
        assert_eq!(entries_this_month(&entries, day(25)), 2);

        let stats = DiaryStats::compute(&entries, day(25));
        assert_eq!(stats.total, 4);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_relative_time_wording() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let ago = |days: i64| relative_time(now - Duration::days(days), now);

        assert_eq!(ago(0), "Today");
        assert_eq!(ago(1), "Yesterday");
        assert_eq!(ago(6), "6 days ago");
        assert_eq!(ago(14), "2 weeks ago");
        assert_eq!(ago(65), "2 months ago");
    }
}
