//! Achievement catalog and bounded unlock evaluation.
//!
//! Evaluation runs at most two passes over the catalog: the first catches everything the
//! triggering mutation made true, the second catches unlocks caused by rewards granted in
//! the first (typically level thresholds). Anything a second-pass reward would unlock
//! waits for the next mutation.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument, warn};

use crate::domain::{AchievementCategory, AchievementDefinition, ProgressionRecord, Rarity, StarLevel, TieredAchievement};
use crate::error::{EngineError, EngineResult};

const MAX_PASSES: usize = 2;

/// Ordered, id-unique set of achievement definitions.
///
/// Tiered achievements are expanded into one definition per star and appended after the
/// plain ones, so every star goes through the same one-time unlock path.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  defs: Vec<AchievementDefinition>,
  index: HashMap<String, usize>,
  tiered: Vec<TieredAchievement>,
}

impl Catalog {
  /// Build a catalog; later duplicates of an id are dropped, the first one wins.
  pub fn new(defs: impl IntoIterator<Item = AchievementDefinition>) -> Self {
    let mut catalog = Catalog::default();
    for def in defs {
      catalog.push(def);
    }
    catalog
  }

  /// Append tiered achievements. Invalid ones, and ones whose star ids collide with
  /// existing entries, are skipped whole.
  pub fn with_tiered(mut self, tiered: impl IntoIterator<Item = TieredAchievement>) -> Self {
    for t in tiered {
      if let Err(reason) = t.validate() {
        warn!(target: "achievement", id = %t.id, %reason, "Skipping invalid tiered achievement");
        continue;
      }
      let defs = t.definitions();
      if self.tiered.iter().any(|o| o.id == t.id) || defs.iter().any(|d| self.contains(&d.id)) {
        warn!(target: "achievement", id = %t.id, "Skipping tiered achievement with duplicate ids");
        continue;
      }
      for def in defs {
        self.push(def);
      }
      self.tiered.push(t);
    }
    self
  }

  fn push(&mut self, def: AchievementDefinition) {
    if self.index.contains_key(&def.id) {
      warn!(target: "achievement", id = %def.id, "Skipping duplicate achievement id");
      return;
    }
    self.index.insert(def.id.clone(), self.defs.len());
    self.defs.push(def);
  }

  pub fn get(&self, id: &str) -> EngineResult<&AchievementDefinition> {
    self.index
      .get(id)
      .map(|&i| &self.defs[i])
      .ok_or_else(|| EngineError::invalid(format!("unknown achievement id '{id}'")))
  }

  pub fn contains(&self, id: &str) -> bool {
    self.index.contains_key(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &AchievementDefinition> {
    self.defs.iter()
  }

  pub fn len(&self) -> usize {
    self.defs.len()
  }

  /// Star progress of every tiered achievement for `record`, in catalog order.
  pub fn tiered_status(&self, record: &ProgressionRecord) -> Vec<TieredStatus> {
    self
      .tiered
      .iter()
      .map(|t| {
        let earned: Vec<u8> = t
          .stars
          .iter()
          .filter(|s| record.unlocked_achievement_ids.contains(&t.star_id(s.star)))
          .map(|s| s.star)
          .collect();
        TieredStatus {
          id: t.id.clone(),
          title: t.title.clone(),
          category: t.category,
          rarity: t.rarity,
          progress: t.metric.current(record),
          next_star: t.stars.iter().find(|s| !earned.contains(&s.star)).copied(),
          xp_earned: t.stars.iter().filter(|s| earned.contains(&s.star)).map(|s| s.xp_reward).sum(),
          stars_earned: earned,
        }
      })
      .collect()
  }
}

/// Where a subject stands on one tiered achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredStatus {
  pub id: String,
  pub title: String,
  pub category: AchievementCategory,
  pub rarity: Rarity,
  /// Current value of the measured metric.
  pub progress: u64,
  pub stars_earned: Vec<u8>,
  /// Lowest star not yet earned; `None` once all are.
  pub next_star: Option<StarLevel>,
  pub xp_earned: u64,
}

/// Result of one evaluation, for the caller to display and log.
#[derive(Debug, Default)]
pub struct Evaluation {
  /// Newly unlocked definitions, in catalog order.
  pub unlocked: Vec<AchievementDefinition>,
  pub xp_granted: u64,
  /// `PredicateFailure`s; each skipped only its own achievement.
  pub failures: Vec<EngineError>,
}

/// Unlock every achievement whose condition holds for `record`.
///
/// On error the record is left exactly as it was passed in.
#[instrument(level = "debug", skip_all, fields(subject = %record.subject_id))]
pub fn evaluate(record: &mut ProgressionRecord, catalog: &Catalog) -> EngineResult<Evaluation> {
  record.check_invariants().map_err(|reason| EngineError::MalformedRecord {
    subject_id: record.subject_id.clone(),
    reason,
  })?;
  if let Some(unknown) = record.unlocked_achievement_ids.iter().find(|id| !catalog.contains(id)) {
    return Err(EngineError::invalid(format!(
      "record '{}' holds unknown achievement id '{}'",
      record.subject_id, unknown
    )));
  }

  let mut working = record.clone();
  let mut unlocked_idx: Vec<usize> = Vec::new();
  let mut failed: HashSet<&str> = HashSet::new();
  let mut eval = Evaluation::default();

  for pass in 0..MAX_PASSES {
    let before = unlocked_idx.len();
    for (idx, def) in catalog.defs.iter().enumerate() {
      if working.unlocked_achievement_ids.contains(&def.id) {
        continue;
      }
      match def.condition.evaluate(&working) {
        Ok(true) => {
          working.grant_xp(def.xp_reward)?;
          working.unlocked_achievement_ids.insert(def.id.clone());
          eval.xp_granted += def.xp_reward;
          unlocked_idx.push(idx);
          info!(target: "achievement", subject = %working.subject_id, id = %def.id, reward = def.xp_reward, pass, "Achievement unlocked");
        }
        Ok(false) => {}
        Err(reason) => {
          if failed.insert(def.id.as_str()) {
            warn!(target: "achievement", subject = %working.subject_id, id = %def.id, %reason, "Achievement predicate failed; skipping");
            eval.failures.push(EngineError::PredicateFailure { achievement_id: def.id.clone(), reason });
          }
        }
      }
    }
    if unlocked_idx.len() == before {
      break;
    }
  }

  unlocked_idx.sort_unstable();
  eval.unlocked = unlocked_idx.into_iter().map(|i| catalog.defs[i].clone()).collect();
  debug!(target: "achievement", subject = %working.subject_id, unlocked = eval.unlocked.len(), xp = eval.xp_granted, "Evaluation finished");
  *record = working;
  Ok(eval)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Condition, CustomPredicate};
  use crate::levels::level_for;
  use crate::seeds::seed_achievements;

  fn def(id: &str, xp_reward: u64, condition: Condition) -> AchievementDefinition {
    AchievementDefinition {
      id: id.into(),
      title: id.into(),
      description: String::new(),
      icon: String::new(),
      xp_reward,
      condition,
      star: None,
    }
  }

  fn record(total_xp: u64, actions: u64) -> ProgressionRecord {
    let mut r = ProgressionRecord::new("u1");
    r.grant_xp(total_xp).unwrap();
    r.total_actions_count = actions;
    r
  }

  #[test]
  fn duplicate_ids_keep_first() {
    let c = Catalog::new(vec![
      def("a", 1, Condition::ActionsAtLeast { value: 1 }),
      def("a", 99, Condition::ActionsAtLeast { value: 1 }),
    ]);
    assert_eq!(c.len(), 1);
    assert_eq!(c.get("a").unwrap().xp_reward, 1);
    assert!(matches!(c.get("zzz"), Err(EngineError::InvalidArgument(_))));
  }

  #[test]
  fn unlocks_once_and_grants_reward() {
    let catalog = Catalog::new(seed_achievements());
    let mut r = record(50, 1);
    let eval = evaluate(&mut r, &catalog).unwrap();
    assert_eq!(eval.unlocked.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["first_action"]);
    assert_eq!(eval.xp_granted, 10);
    assert_eq!(r.total_xp, 60);

    let again = evaluate(&mut r, &catalog).unwrap();
    assert!(again.unlocked.is_empty());
    assert_eq!(again.xp_granted, 0);
    assert_eq!(r.total_xp, 60);
    assert!(r.unlocked_achievement_ids.contains("first_action"));
  }

  #[test]
  fn reward_crossing_level_unlocks_in_second_pass() {
    // 1990 XP is level 4. level_5 is checked first and fails; the xp_1000 reward then
    // lifts the record to 2090 (level 5), which the second pass picks up.
    let catalog = Catalog::new(vec![
      def("level_5", 200, Condition::LevelAtLeast { value: 5 }),
      def("xp_1000", 100, Condition::TotalXpAtLeast { value: 1_000 }),
    ]);
    let mut r = record(1_990, 0);
    let eval = evaluate(&mut r, &catalog).unwrap();
    let ids: Vec<_> = eval.unlocked.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["level_5", "xp_1000"], "catalog order, not detection order");
    assert_eq!(r.total_xp, 1_990 + 100 + 200);
    assert_eq!(r.level, level_for(r.total_xp));
  }

  #[test]
  fn cascade_stops_after_two_passes() {
    let catalog = Catalog::new(vec![
      def("c", 1, Condition::TotalXpAtLeast { value: 12 }),
      def("b", 1, Condition::TotalXpAtLeast { value: 11 }),
      def("a", 1, Condition::TotalXpAtLeast { value: 10 }),
    ]);
    let mut r = record(10, 0);
    let eval = evaluate(&mut r, &catalog).unwrap();
    // pass 1: a (xp 11); pass 2: b (xp 12) ... c waits for the next mutation
    let ids: Vec<_> = eval.unlocked.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(r.total_xp, 12);
    let next = evaluate(&mut r, &catalog).unwrap();
    assert_eq!(next.unlocked[0].id, "c");
  }

  #[test]
  fn failing_predicate_is_isolated() {
    let boom = CustomPredicate::new("boom", |_| Err("counter unavailable".into()));
    let catalog = Catalog::new(vec![
      def("broken", 500, Condition::Custom { predicate: boom }),
      def("first", 10, Condition::ActionsAtLeast { value: 1 }),
    ]);
    let mut r = record(0, 1);
    let eval = evaluate(&mut r, &catalog).unwrap();
    assert_eq!(eval.unlocked.len(), 1);
    assert_eq!(eval.failures.len(), 1);
    assert!(matches!(&eval.failures[0], EngineError::PredicateFailure { achievement_id, .. } if achievement_id == "broken"));
    assert!(!r.unlocked_achievement_ids.contains("broken"));
  }

  #[test]
  fn malformed_record_fails_closed() {
    let catalog = Catalog::new(seed_achievements());
    let mut r = record(0, 5);
    r.level = 9;
    let before = r.clone();
    assert!(matches!(evaluate(&mut r, &catalog), Err(EngineError::MalformedRecord { .. })));
    assert_eq!(r, before);

    let mut r = record(0, 5);
    r.unlocked_achievement_ids.insert("retired_badge".into());
    let before = r.clone();
    assert!(matches!(evaluate(&mut r, &catalog), Err(EngineError::InvalidArgument(_))));
    assert_eq!(r, before);
  }

  #[test]
  fn streak_badges_follow_longest_streak() {
    let catalog = Catalog::new(seed_achievements());
    let mut r = record(0, 1);
    r.current_streak_days = 1;
    r.longest_streak_days = 10;
    r.last_activity_date = "2024-01-03".into();
    let eval = evaluate(&mut r, &catalog).unwrap();
    let ids: Vec<_> = eval.unlocked.iter().map(|d| d.id.as_str()).collect();
    assert!(ids.contains(&"streak_3") && ids.contains(&"streak_7"), "{ids:?}");
    assert!(!ids.contains(&"streak_30"));

    let xp = r.total_xp;
    r.current_streak_days = 0;
    let eval = evaluate(&mut r, &catalog).unwrap();
    assert!(eval.unlocked.is_empty());
    assert!(r.unlocked_achievement_ids.contains("streak_7"));
    assert_eq!(r.total_xp, xp);
  }

  #[test]
  fn reward_overflow_leaves_record_untouched() {
    let catalog = Catalog::new(vec![
      def("small", 10, Condition::ActionsAtLeast { value: 1 }),
      def("huge", u64::MAX, Condition::ActionsAtLeast { value: 1 }),
    ]);
    let mut r = record(0, 1);
    let before = r.clone();
    assert!(matches!(evaluate(&mut r, &catalog), Err(EngineError::InvalidArgument(_))));
    assert_eq!(r, before);
  }

  fn consistency() -> TieredAchievement {
    TieredAchievement {
      id: "consistency".into(),
      title: "Dedicated Scholar".into(),
      description: String::new(),
      icon: String::new(),
      category: AchievementCategory::Engagement,
      rarity: Rarity::Epic,
      metric: crate::domain::Metric::LongestStreak,
      stars: vec![
        StarLevel { star: 1, requirement: 7, xp_reward: 100 },
        StarLevel { star: 2, requirement: 30, xp_reward: 300 },
        StarLevel { star: 3, requirement: 90, xp_reward: 900 },
      ],
    }
  }

  fn streak_record(longest: u32) -> ProgressionRecord {
    let mut r = record(0, 1);
    r.current_streak_days = longest;
    r.longest_streak_days = longest;
    r.last_activity_date = "2024-01-03".into();
    r
  }

  #[test]
  fn stars_unlock_once_each_in_catalog_order() {
    let catalog = Catalog::new(vec![def("first", 10, Condition::ActionsAtLeast { value: 1 })]).with_tiered([consistency()]);
    assert_eq!(catalog.len(), 4);

    let mut r = streak_record(31);
    let eval = evaluate(&mut r, &catalog).unwrap();
    let ids: Vec<_> = eval.unlocked.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "consistency_star1", "consistency_star2"]);
    assert_eq!(eval.xp_granted, 10 + 100 + 300);
    assert_eq!(eval.unlocked[1].star.as_ref().map(|s| s.family.as_str()), Some("consistency"));

    let status = &catalog.tiered_status(&r)[0];
    assert_eq!(status.stars_earned, vec![1, 2]);
    assert_eq!(status.progress, 31);
    assert_eq!(status.next_star.map(|s| s.requirement), Some(90));
    assert_eq!(status.xp_earned, 400);

    assert!(evaluate(&mut r, &catalog).unwrap().unlocked.is_empty());
    r.current_streak_days = 90;
    r.longest_streak_days = 90;
    let eval = evaluate(&mut r, &catalog).unwrap();
    assert_eq!(eval.unlocked.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["consistency_star3"]);
    assert_eq!(catalog.tiered_status(&r)[0].next_star, None);
  }

  #[test]
  fn invalid_or_clashing_tiered_are_skipped() {
    let mut broken = consistency();
    broken.id = "broken".into();
    broken.stars.reverse();
    let catalog = Catalog::new(vec![def("consistency_star1", 1, Condition::ActionsAtLeast { value: 1 })])
      .with_tiered([broken, consistency()]);
    assert_eq!(catalog.len(), 1);
    assert!(catalog.tiered_status(&ProgressionRecord::new("u1")).is_empty());
  }
}
