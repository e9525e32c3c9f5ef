//! XP → level derivation, level tiers and level-change detection.
//!
//! Levels use cumulative thresholds: `threshold(1) = 0` and every later level needs a
//! strictly larger total. The table is piecewise linear; the last segment is open-ended,
//! so the level function is total over every non-negative XP amount.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

struct LevelSegment {
  first_level: u32,
  base_xp: u64,
  step: u64,
}

const LEVEL_SEGMENTS: &[LevelSegment] = &[
  LevelSegment { first_level: 1, base_xp: 0, step: 500 },
  LevelSegment { first_level: 6, base_xp: 2_500, step: 500 },
  LevelSegment { first_level: 11, base_xp: 5_000, step: 500 },
  LevelSegment { first_level: 21, base_xp: 10_000, step: 667 },
  LevelSegment { first_level: 36, base_xp: 20_000, step: 1_000 },
  LevelSegment { first_level: 51, base_xp: 35_000, step: 1_000 },
  LevelSegment { first_level: 76, base_xp: 60_000, step: 1_600 },
];

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlowIntensity {
  Minimal,
  Slight,
  Medium,
  Strong,
  Intense,
  Epic,
  Legendary,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LevelTier {
  pub min_level: u32,
  /// `None` for the last, open-ended tier.
  pub max_level: Option<u32>,
  pub title: &'static str,
  pub color: &'static str,
  pub glow: GlowIntensity,
  pub unlocks: &'static [&'static str],
}

pub static LEVEL_TIERS: &[LevelTier] = &[
  LevelTier {
    min_level: 1,
    max_level: Some(5),
    title: "Novice Explorer",
    color: "#3b82f6",
    glow: GlowIntensity::Minimal,
    unlocks: &["Basic roadmap generation (1 at a time)"],
  },
  LevelTier {
    min_level: 6,
    max_level: Some(10),
    title: "Apprentice Learner",
    color: "#a855f7",
    glow: GlowIntensity::Slight,
    unlocks: &["Multiple roadmaps (up to 3)"],
  },
  LevelTier {
    min_level: 11,
    max_level: Some(20),
    title: "Skilled Navigator",
    color: "#06b6d4",
    glow: GlowIntensity::Medium,
    unlocks: &["Advanced roadmap customization"],
  },
  LevelTier {
    min_level: 21,
    max_level: Some(35),
    title: "Master Strategist",
    color: "#6366f1",
    glow: GlowIntensity::Strong,
    unlocks: &["Community roadmap sharing"],
  },
  LevelTier {
    min_level: 36,
    max_level: Some(50),
    title: "Elite Pathfinder",
    color: "#fbbf24",
    glow: GlowIntensity::Intense,
    unlocks: &["Custom achievement creation"],
  },
  LevelTier {
    min_level: 51,
    max_level: Some(75),
    title: "Legendary Sage",
    color: "linear-gradient(135deg, #f093fb 0%, #f5576c 100%)",
    glow: GlowIntensity::Epic,
    unlocks: &["Mentor features", "Exclusive badges"],
  },
  LevelTier {
    min_level: 76,
    max_level: None,
    title: "Grandmaster",
    color: "linear-gradient(135deg, #667eea 0%, #764ba2 50%, #f093fb 100%)",
    glow: GlowIntensity::Legendary,
    unlocks: &["All features", "Special cosmetics"],
  },
];

/// Cumulative XP needed to reach `level`. Levels below 1 are treated as level 1.
pub fn threshold(level: u32) -> u64 {
  let level = level.max(1);
  let seg = LEVEL_SEGMENTS
    .iter()
    .rev()
    .find(|s| s.first_level <= level)
    .unwrap_or(&LEVEL_SEGMENTS[0]);
  seg.base_xp
    .saturating_add(u64::from(level - seg.first_level).saturating_mul(seg.step))
}

/// Largest level whose threshold is at or below `total_xp`.
pub fn level_for(total_xp: u64) -> u32 {
  let idx = LEVEL_SEGMENTS
    .iter()
    .rposition(|s| s.base_xp <= total_xp)
    .unwrap_or(0);
  let seg = &LEVEL_SEGMENTS[idx];
  let offset = (total_xp - seg.base_xp) / seg.step;
  let offset = match LEVEL_SEGMENTS.get(idx + 1) {
    Some(next) => offset.min(u64::from(next.first_level - seg.first_level - 1)),
    None => offset,
  };
  u32::try_from(offset)
    .ok()
    .and_then(|o| seg.first_level.checked_add(o))
    .unwrap_or(u32::MAX)
}

pub fn non_negative_xp(xp: i64) -> EngineResult<u64> {
  u64::try_from(xp).map_err(|_| EngineError::invalid(format!("XP must be non-negative, got {xp}")))
}

pub fn xp_to_next_level(total_xp: u64) -> u64 {
  let level = level_for(total_xp);
  threshold(level.saturating_add(1)).saturating_sub(total_xp)
}

pub fn tier_for_level(level: u32) -> &'static LevelTier {
  LEVEL_TIERS
    .iter()
    .find(|t| level >= t.min_level && t.max_level.map_or(true, |max| level <= max))
    .unwrap_or(&LEVEL_TIERS[0])
}

#[derive(Debug, Serialize)]
pub struct LevelProgress {
  pub level: u32,
  pub xp_into_level: u64,
  pub xp_to_next_level: u64,
  pub total_xp: u64,
  pub tier: &'static LevelTier,
}

/// Checked entry point for callers holding a signed amount.
pub fn checked_level_progress(total_xp: i64) -> EngineResult<LevelProgress> {
  Ok(level_progress(non_negative_xp(total_xp)?))
}

pub fn level_progress(total_xp: u64) -> LevelProgress {
  let level = level_for(total_xp);
  LevelProgress {
    level,
    xp_into_level: total_xp - threshold(level),
    xp_to_next_level: xp_to_next_level(total_xp),
    total_xp,
    tier: tier_for_level(level),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
  pub leveled_up: bool,
  pub old_level: u32,
  pub new_level: u32,
  pub tier_changed: bool,
}

pub fn level_change(old_xp: u64, new_xp: u64) -> LevelChange {
  let old_level = level_for(old_xp);
  let new_level = level_for(new_xp);
  let leveled_up = new_level > old_level;
  LevelChange {
    leveled_up,
    old_level,
    new_level,
    tier_changed: leveled_up && tier_for_level(old_level).title != tier_for_level(new_level).title,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_xp_is_level_one_novice() {
    assert_eq!(level_for(0), 1);
    assert_eq!(tier_for_level(1).title, "Novice Explorer");
    assert_eq!(xp_to_next_level(0), threshold(2));
    assert_eq!(threshold(2), 500);
  }

  #[test]
  fn thresholds_strictly_increase() {
    assert_eq!(threshold(1), 0);
    for l in 1..300 {
      assert!(threshold(l) < threshold(l + 1), "threshold({l}) not below threshold({})", l + 1);
    }
  }

  #[test]
  fn level_is_largest_reached_threshold() {
    for l in 1..200u32 {
      let t = threshold(l);
      assert_eq!(level_for(t), l);
      if t > 0 {
        assert_eq!(level_for(t - 1), l - 1);
      }
    }
  }

  #[test]
  fn segment_edges() {
    assert_eq!(level_for(499), 1);
    assert_eq!(level_for(2_499), 5);
    assert_eq!(level_for(2_500), 6);
    assert_eq!(level_for(19_999), 35);
    assert_eq!(level_for(20_000), 36);
    assert_eq!(level_for(60_000), 76);
  }

  #[test]
  fn tail_extrapolates_without_cap() {
    assert_eq!(level_for(60_000 + 1_600 * 100), 176);
    assert_eq!(xp_to_next_level(60_000 + 1_600 * 100), 1_600);
    assert_eq!(tier_for_level(176).title, "Grandmaster");
    assert!(level_for(u64::MAX) > 76);
  }

  #[test]
  fn level_is_monotone() {
    let mut prev = level_for(0);
    for xp in (0..120_000u64).step_by(37) {
      let l = level_for(xp);
      assert!(l >= prev);
      prev = l;
    }
  }

  #[test]
  fn negative_xp_is_rejected() {
    assert!(matches!(checked_level_progress(-1), Err(EngineError::InvalidArgument(_))));
    assert!(matches!(non_negative_xp(i64::MIN), Err(EngineError::InvalidArgument(_))));
    assert_eq!(checked_level_progress(2_500).unwrap().level, 6);
  }

  #[test]
  fn tiers_are_contiguous() {
    for pair in LEVEL_TIERS.windows(2) {
      assert_eq!(pair[0].max_level.map(|m| m + 1), Some(pair[1].min_level));
    }
    assert_eq!(tier_for_level(5).title, "Novice Explorer");
    assert_eq!(tier_for_level(6).title, "Apprentice Learner");
    assert_eq!(tier_for_level(75).title, "Legendary Sage");
    assert_eq!(tier_for_level(76).title, "Grandmaster");
  }

  #[test]
  fn progress_and_change() {
    let p = level_progress(2_700);
    assert_eq!(p.level, 6);
    assert_eq!(p.xp_into_level, 200);
    assert_eq!(p.xp_to_next_level, 300);
    assert_eq!(p.tier.title, "Apprentice Learner");

    let c = level_change(2_400, 2_600);
    assert!(c.leveled_up && c.tier_changed);
    assert_eq!((c.old_level, c.new_level), (5, 6));
    assert!(!level_change(100, 200).leveled_up);
  }
}
