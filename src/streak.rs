//! Calendar-day streak tracking and the streak XP multiplier.

use chrono::NaiveDate;

use crate::domain::ProgressionRecord;
use crate::error::{EngineError, EngineResult};
use crate::util::{format_day, parse_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
  /// Already active today; nothing changed.
  Unchanged,
  /// Last activity was yesterday; streak extended by one.
  Continued,
  /// First activity ever, or after a gap of two or more days.
  Started,
}

/// Apply one qualifying action on `today` to the streak fields of `record`.
///
/// Only the first action of a calendar day moves the streak. A `today` earlier than the
/// recorded last activity is rejected instead of rewinding the record.
pub fn record_activity(record: &mut ProgressionRecord, today: NaiveDate) -> EngineResult<StreakChange> {
  let last = if record.last_activity_date.is_empty() {
    None
  } else {
    Some(parse_day(&record.last_activity_date)?)
  };

  let change = match last {
    Some(d) if d == today => return Ok(StreakChange::Unchanged),
    Some(d) if d > today => {
      return Err(EngineError::invalid(format!(
        "activity date {} is before last activity {}",
        format_day(today),
        record.last_activity_date
      )))
    }
    Some(d) if today.pred_opt() == Some(d) => {
      record.current_streak_days = record.current_streak_days.saturating_add(1);
      StreakChange::Continued
    }
    _ => {
      record.current_streak_days = 1;
      StreakChange::Started
    }
  };

  record.longest_streak_days = record.longest_streak_days.max(record.current_streak_days);
  record.last_activity_date = format_day(today);
  Ok(change)
}

/// Multiplier as an exact ratio, so scaled XP floors without float rounding.
fn multiplier_ratio(streak_days: u32) -> (u128, u128) {
  match streak_days {
    d if d >= 365 => (3, 1),
    d if d >= 90 => (2, 1),
    d if d >= 30 => (3, 2),
    d if d >= 7 => (5, 4),
    _ => (1, 1),
  }
}

/// XP multiplier for a streak length. Recomputed on read, never stored.
pub fn streak_multiplier(streak_days: u32) -> f64 {
  let (num, den) = multiplier_ratio(streak_days);
  num as f64 / den as f64
}

/// `floor(base_xp * multiplier)`, or `None` if the result does not fit in a `u64`.
pub fn apply_multiplier(base_xp: u64, streak_days: u32) -> Option<u64> {
  let (num, den) = multiplier_ratio(streak_days);
  u64::try_from(u128::from(base_xp) * num / den).ok()
}

/// One-time bonuses keyed by streak length.
pub const STREAK_MILESTONES: &[(u32, u64)] = &[(7, 100), (30, 300), (90, 900), (180, 1_800), (365, 3_600)];

/// Bonus for milestones crossed for the first time: above the previous longest streak,
/// at or below the current one.
pub fn milestone_reward(previous_longest: u32, current_streak: u32) -> u64 {
  STREAK_MILESTONES
    .iter()
    .filter(|(days, _)| *days > previous_longest && *days <= current_streak)
    .map(|(_, xp)| xp)
    .sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(s: &str) -> NaiveDate {
    parse_day(s).unwrap()
  }

  fn record_with(last: &str, current: u32, longest: u32) -> ProgressionRecord {
    let mut r = ProgressionRecord::new("u1");
    r.last_activity_date = last.into();
    r.current_streak_days = current;
    r.longest_streak_days = longest;
    r
  }

  #[test]
  fn first_activity_starts_streak() {
    let mut r = ProgressionRecord::new("u1");
    assert_eq!(record_activity(&mut r, day("2024-01-01")).unwrap(), StreakChange::Started);
    assert_eq!((r.current_streak_days, r.longest_streak_days), (1, 1));
    assert_eq!(r.last_activity_date, "2024-01-01");
  }

  #[test]
  fn same_day_is_idempotent() {
    let mut r = ProgressionRecord::new("u1");
    record_activity(&mut r, day("2024-01-01")).unwrap();
    let snapshot = r.clone();
    assert_eq!(record_activity(&mut r, day("2024-01-01")).unwrap(), StreakChange::Unchanged);
    assert_eq!(r, snapshot);
  }

  #[test]
  fn gap_resets_to_one() {
    let mut r = record_with("2024-01-01", 5, 5);
    assert_eq!(record_activity(&mut r, day("2024-01-05")).unwrap(), StreakChange::Started);
    assert_eq!(r.current_streak_days, 1);
    assert_eq!(r.longest_streak_days, 5);
  }

  #[test]
  fn yesterday_continues() {
    let mut r = record_with("2024-01-01", 3, 3);
    assert_eq!(record_activity(&mut r, day("2024-01-02")).unwrap(), StreakChange::Continued);
    assert_eq!(r.current_streak_days, 4);
    assert!(r.longest_streak_days >= 4);
  }

  #[test]
  fn calendar_boundaries_not_rolling_window() {
    let mut r = record_with("2024-02-28", 1, 1);
    record_activity(&mut r, day("2024-02-29")).unwrap();
    record_activity(&mut r, day("2024-03-01")).unwrap();
    let mut r2 = record_with("2023-12-31", 9, 12);
    record_activity(&mut r2, day("2024-01-01")).unwrap();
    assert_eq!(r.current_streak_days, 3);
    assert_eq!((r2.current_streak_days, r2.longest_streak_days), (10, 12));
  }

  #[test]
  fn time_travel_and_bad_dates_are_rejected() {
    let mut r = record_with("2024-01-05", 2, 2);
    let before = r.clone();
    assert!(record_activity(&mut r, day("2024-01-04")).is_err());
    assert_eq!(r, before);

    let mut bad = record_with("01/05/2024", 2, 2);
    assert!(matches!(record_activity(&mut bad, day("2024-01-06")), Err(EngineError::InvalidArgument(_))));
  }

  #[test]
  fn multiplier_steps() {
    assert_eq!(streak_multiplier(0), 1.0);
    assert_eq!(streak_multiplier(6), 1.0);
    assert_eq!(streak_multiplier(7), 1.25);
    assert_eq!(streak_multiplier(30), 1.5);
    assert_eq!(streak_multiplier(90), 2.0);
    assert_eq!(streak_multiplier(365), 3.0);
    assert_eq!(apply_multiplier(10, 7), Some(12));
    assert_eq!(apply_multiplier(100, 1), Some(100));
    assert_eq!(apply_multiplier(7, 30), Some(10));
  }

  #[test]
  fn multiplier_overflow_is_reported() {
    assert_eq!(apply_multiplier(u64::MAX, 6), Some(u64::MAX));
    assert_eq!(apply_multiplier(u64::MAX, 365), None);
    assert_eq!(apply_multiplier(u64::MAX / 2, 90), Some(u64::MAX - 1));
  }

  #[test]
  fn milestones_pay_once() {
    assert_eq!(milestone_reward(6, 7), 100);
    assert_eq!(milestone_reward(7, 7), 0, "already reached before");
    assert_eq!(milestone_reward(40, 8), 0, "restarted streak below the old record");
    assert_eq!(milestone_reward(89, 90), 900);
    assert_eq!(milestone_reward(364, 365), 3_600);
    assert_eq!(milestone_reward(0, 1), 0);
  }
}
