//! Domain models: the per-subject progression record, achievement definitions and
//! their conditions, and daily challenge templates/instances.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::levels::level_for;
use crate::util::parse_day;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Subject id for a user inside a conversation.
pub fn conversation_subject_id(conversation_id: &str, user_id: &str) -> String {
  format!("{}_{}", conversation_id, user_id)
}

fn default_level() -> u32 { 1 }

/// Persisted progression state of one subject (a user, or a user within a conversation).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressionRecord {
  /// 0 means "written before versioning"; see `migrate`.
  #[serde(default)] pub schema_version: u32,
  pub subject_id: String,
  /// Bumped on every save; the store uses it as a compare-and-swap token.
  #[serde(default)] pub revision: u64,

  #[serde(default)] pub total_xp: u64,
  #[serde(default = "default_level")] pub level: u32,

  #[serde(default)] pub current_streak_days: u32,
  #[serde(default)] pub longest_streak_days: u32,
  /// `YYYY-MM-DD` or empty if the subject never acted.
  #[serde(default)] pub last_activity_date: String,

  #[serde(default)] pub total_actions_count: u64,
  #[serde(default)] pub action_counts: BTreeMap<String, u64>,

  #[serde(default)] pub unlocked_achievement_ids: BTreeSet<String>,

  #[serde(default)] pub daily_challenges: Option<DailyChallengeSet>,
  /// Superseded sets, oldest first.
  #[serde(default)] pub challenge_history: Vec<DailyChallengeSet>,
}

impl ProgressionRecord {
  pub fn new(subject_id: impl Into<String>) -> Self {
    Self {
      schema_version: CURRENT_SCHEMA_VERSION,
      subject_id: subject_id.into(),
      revision: 0,
      total_xp: 0,
      level: 1,
      current_streak_days: 0,
      longest_streak_days: 0,
      last_activity_date: String::new(),
      total_actions_count: 0,
      action_counts: BTreeMap::new(),
      unlocked_achievement_ids: BTreeSet::new(),
      daily_challenges: None,
      challenge_history: Vec::new(),
    }
  }

  /// Bring an older record up to `CURRENT_SCHEMA_VERSION`.
  pub fn migrate(mut self) -> EngineResult<Self> {
    match self.schema_version {
      0 => {
        // Unversioned records stored `level` independently; re-derive it.
        self.level = level_for(self.total_xp);
        self.longest_streak_days = self.longest_streak_days.max(self.current_streak_days);
        self.schema_version = CURRENT_SCHEMA_VERSION;
        Ok(self)
      }
      CURRENT_SCHEMA_VERSION => Ok(self),
      found => Err(EngineError::UnsupportedSchema { found, supported: CURRENT_SCHEMA_VERSION }),
    }
  }

  /// Add XP and re-derive the level. Fails, leaving the record as is, if the total would overflow.
  pub fn grant_xp(&mut self, amount: u64) -> EngineResult<()> {
    self.total_xp = self.total_xp.checked_add(amount).ok_or_else(|| {
      EngineError::invalid(format!(
        "granting {amount} XP overflows the total of subject '{}' ({})",
        self.subject_id, self.total_xp
      ))
    })?;
    self.level = level_for(self.total_xp);
    Ok(())
  }

  pub fn action_count(&self, action_type: &str) -> u64 {
    self.action_counts.get(action_type).copied().unwrap_or(0)
  }

  /// Structural invariants that do not depend on any catalog.
  pub fn check_invariants(&self) -> Result<(), String> {
    if self.subject_id.is_empty() {
      return Err("empty subject id".into());
    }
    if self.level != level_for(self.total_xp) {
      return Err(format!("level {} does not match total_xp {}", self.level, self.total_xp));
    }
    if self.current_streak_days > self.longest_streak_days {
      return Err(format!(
        "current streak {} exceeds longest streak {}",
        self.current_streak_days, self.longest_streak_days
      ));
    }
    if !self.last_activity_date.is_empty() {
      parse_day(&self.last_activity_date).map_err(|e| e.to_string())?;
    } else if self.current_streak_days > 0 {
      return Err("streak without a last activity date".into());
    }
    let sum: u64 = self.action_counts.values().sum();
    if sum > self.total_actions_count {
      return Err(format!("per-action counts ({sum}) exceed total actions ({})", self.total_actions_count));
    }
    if let Some(set) = &self.daily_challenges {
      set.check_invariants()?;
    }
    Ok(())
  }
}

/// Monotone unlock condition of an achievement.
///
/// Only quantities that never decrease are available; the current streak is not one of
/// them, so streak achievements use the longest streak.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
  TotalXpAtLeast { value: u64 },
  LevelAtLeast { value: u32 },
  LongestStreakAtLeast { value: u32 },
  ActionsAtLeast { value: u64 },
  ActionCountAtLeast { action_type: String, value: u64 },
  /// Code-defined predicate; not expressible in config.
  #[serde(skip_deserializing)]
  Custom { predicate: CustomPredicate },
}

impl Condition {
  pub fn evaluate(&self, r: &ProgressionRecord) -> Result<bool, String> {
    Ok(match self {
      Condition::TotalXpAtLeast { value } => r.total_xp >= *value,
      Condition::LevelAtLeast { value } => r.level >= *value,
      Condition::LongestStreakAtLeast { value } => r.longest_streak_days >= *value,
      Condition::ActionsAtLeast { value } => r.total_actions_count >= *value,
      Condition::ActionCountAtLeast { action_type, value } => r.action_count(action_type) >= *value,
      Condition::Custom { predicate } => return (predicate.check)(r),
    })
  }
}

type PredicateFn = dyn Fn(&ProgressionRecord) -> Result<bool, String> + Send + Sync;

#[derive(Clone)]
pub struct CustomPredicate {
  pub name: &'static str,
  pub check: Arc<PredicateFn>,
}

impl CustomPredicate {
  pub fn new(
    name: &'static str,
    check: impl Fn(&ProgressionRecord) -> Result<bool, String> + Send + Sync + 'static,
  ) -> Self {
    Self { name, check: Arc::new(check) }
  }
}

impl fmt::Debug for CustomPredicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CustomPredicate").field("name", &self.name).finish_non_exhaustive()
  }
}

/// Static catalog entry. The reward is granted once, when the id is first unlocked.
#[derive(Clone, Debug, Deserialize)]
pub struct AchievementDefinition {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub icon: String,
  pub xp_reward: u64,
  pub condition: Condition,
  /// Set for the per-star entries a tiered achievement expands into.
  #[serde(skip)] pub star: Option<StarRef>,
}

/// Never-decreasing quantity a tiered achievement measures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
  TotalXp,
  Level,
  LongestStreak,
  TotalActions,
  ActionCount { action_type: String },
}

impl Metric {
  pub fn current(&self, r: &ProgressionRecord) -> u64 {
    match self {
      Metric::TotalXp => r.total_xp,
      Metric::Level => u64::from(r.level),
      Metric::LongestStreak => u64::from(r.longest_streak_days),
      Metric::TotalActions => r.total_actions_count,
      Metric::ActionCount { action_type } => r.action_count(action_type),
    }
  }

  /// Condition that holds once this metric reaches `value`.
  pub fn at_least(&self, value: u64) -> Condition {
    let small = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    match self {
      Metric::TotalXp => Condition::TotalXpAtLeast { value },
      Metric::Level => Condition::LevelAtLeast { value: small(value) },
      Metric::LongestStreak => Condition::LongestStreakAtLeast { value: small(value) },
      Metric::TotalActions => Condition::ActionsAtLeast { value },
      Metric::ActionCount { action_type } => Condition::ActionCountAtLeast { action_type: action_type.clone(), value },
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
  Generation,
  Completion,
  Engagement,
  Social,
  Special,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
  Common,
  Rare,
  Epic,
  Legendary,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarLevel {
  pub star: u8,
  pub requirement: u64,
  pub xp_reward: u64,
}

/// Which star of which tiered achievement a catalog entry stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StarRef {
  pub family: String,
  pub star: u8,
  pub category: AchievementCategory,
  pub rarity: Rarity,
}

/// Achievement with up to five stars; each star unlocks once, when `metric` reaches its
/// requirement, and pays its own reward.
#[derive(Clone, Debug, Deserialize)]
pub struct TieredAchievement {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub icon: String,
  pub category: AchievementCategory,
  pub rarity: Rarity,
  pub metric: Metric,
  pub stars: Vec<StarLevel>,
}

pub const MAX_STARS: u8 = 5;

impl TieredAchievement {
  pub fn star_id(&self, star: u8) -> String {
    format!("{}_star{}", self.id, star)
  }

  /// Stars must be non-empty, within 1..=5, and strictly increasing in both star number
  /// and requirement.
  pub fn validate(&self) -> Result<(), String> {
    if self.id.is_empty() || self.stars.is_empty() {
      return Err("empty id or no stars".into());
    }
    if self.stars.iter().any(|s| s.star == 0 || s.star > MAX_STARS) {
      return Err(format!("star numbers must be within 1..={MAX_STARS}"));
    }
    for pair in self.stars.windows(2) {
      if pair[1].star <= pair[0].star || pair[1].requirement <= pair[0].requirement {
        return Err(format!("star {} does not increase over star {}", pair[1].star, pair[0].star));
      }
    }
    Ok(())
  }

  /// One catalog entry per star, lowest star first.
  pub fn definitions(&self) -> Vec<AchievementDefinition> {
    self
      .stars
      .iter()
      .map(|s| AchievementDefinition {
        id: self.star_id(s.star),
        title: format!("{} {}", self.title, "★".repeat(usize::from(s.star))),
        description: self.description.clone(),
        icon: self.icon.clone(),
        xp_reward: s.xp_reward,
        condition: self.metric.at_least(s.requirement),
        star: Some(StarRef {
          family: self.id.clone(),
          star: s.star,
          category: self.category,
          rarity: self.rarity,
        }),
      })
      .collect()
  }
}

/// Template a daily challenge instance is generated from.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ChallengeTemplate {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  pub action_type: String,
  pub target: u32,
  pub xp_reward: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyChallengeInstance {
  /// Template id.
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  pub action_type: String,
  pub target: u32,
  pub progress: u32,
  pub completed: bool,
  pub xp_reward: u64,
}

impl DailyChallengeInstance {
  pub fn from_template(t: &ChallengeTemplate) -> Self {
    Self {
      id: t.id.clone(),
      title: t.title.clone(),
      description: t.description.clone(),
      action_type: t.action_type.clone(),
      target: t.target,
      progress: 0,
      completed: false,
      xp_reward: t.xp_reward,
    }
  }
}

/// All challenges generated for one subject on one calendar date.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyChallengeSet {
  pub date: String,
  pub challenges: Vec<DailyChallengeInstance>,
}

impl DailyChallengeSet {
  fn check_invariants(&self) -> Result<(), String> {
    parse_day(&self.date).map_err(|e| e.to_string())?;
    for c in &self.challenges {
      if c.target == 0 {
        return Err(format!("challenge '{}' has a zero target", c.id));
      }
      if c.progress > c.target {
        return Err(format!("challenge '{}' progress {} exceeds target {}", c.id, c.progress, c.target));
      }
      if c.completed != (c.progress == c.target) {
        return Err(format!("challenge '{}' completion flag disagrees with progress", c.id));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conversation_subject_matches_stats_doc_id() {
    assert_eq!(conversation_subject_id("conv9", "alice"), "conv9_alice");
  }

  #[test]
  fn unversioned_record_is_migrated() {
    let json = r#"{"subject_id":"u1","total_xp":2600,"level":2,"current_streak_days":3}"#;
    let r: ProgressionRecord = serde_json::from_str(json).unwrap();
    assert_eq!(r.schema_version, 0);
    let r = r.migrate().unwrap();
    assert_eq!(r.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(r.level, 6);
    assert_eq!(r.longest_streak_days, 3);
  }

  #[test]
  fn newer_schema_is_rejected() {
    let mut r = ProgressionRecord::new("u1");
    r.schema_version = CURRENT_SCHEMA_VERSION + 1;
    assert!(matches!(r.migrate(), Err(EngineError::UnsupportedSchema { .. })));
  }

  #[test]
  fn invariants_catch_bad_records() {
    let mut r = ProgressionRecord::new("u1");
    assert!(r.check_invariants().is_ok());

    r.total_xp = 600;
    assert!(r.check_invariants().is_err());
    r.level = 2;
    assert!(r.check_invariants().is_ok());

    r.current_streak_days = 2;
    r.longest_streak_days = 1;
    assert!(r.check_invariants().is_err());
    r.longest_streak_days = 2;
    assert!(r.check_invariants().is_err(), "streak without date");
    r.last_activity_date = "2024-13-01".into();
    assert!(r.check_invariants().is_err());
    r.last_activity_date = "2024-01-01".into();
    assert!(r.check_invariants().is_ok());
  }

  #[test]
  fn challenge_flag_must_match_progress() {
    let mut r = ProgressionRecord::new("u1");
    let mut c = DailyChallengeInstance::from_template(&ChallengeTemplate {
      id: "t".into(),
      title: "T".into(),
      description: String::new(),
      action_type: "lesson_complete".into(),
      target: 2,
      xp_reward: 10,
    });
    c.progress = 2;
    r.daily_challenges = Some(DailyChallengeSet { date: "2024-01-01".into(), challenges: vec![c] });
    assert!(r.check_invariants().is_err());
  }

  #[test]
  fn grant_xp_overflow_leaves_record_alone() {
    let mut r = ProgressionRecord::new("u1");
    r.grant_xp(u64::MAX - 5).unwrap();
    let before = r.clone();
    assert!(matches!(r.grant_xp(6), Err(EngineError::InvalidArgument(_))));
    assert_eq!(r, before);
  }

  #[test]
  fn current_streak_is_not_a_condition() {
    let parsed: Result<AchievementDefinition, _> = toml::from_str(
      r#"
        id = "streak_14"
        title = "Fortnight"
        xp_reward = 140
        condition = { kind = "streak_at_least", value = 14 }
      "#,
    );
    assert!(parsed.is_err());
  }

  fn tiered(stars: Vec<StarLevel>) -> TieredAchievement {
    TieredAchievement {
      id: "finisher".into(),
      title: "Journey Complete".into(),
      description: String::new(),
      icon: String::new(),
      category: AchievementCategory::Completion,
      rarity: Rarity::Rare,
      metric: Metric::ActionCount { action_type: "roadmap_complete".into() },
      stars,
    }
  }

  fn star(star: u8, requirement: u64, xp_reward: u64) -> StarLevel {
    StarLevel { star, requirement, xp_reward }
  }

  #[test]
  fn tiered_expands_one_entry_per_star() {
    let t = tiered(vec![star(1, 1, 200), star(2, 3, 400), star(3, 10, 800)]);
    assert!(t.validate().is_ok());
    let defs = t.definitions();
    assert_eq!(defs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec![
      "finisher_star1",
      "finisher_star2",
      "finisher_star3"
    ]);
    assert_eq!(defs[1].xp_reward, 400);
    assert_eq!(defs[1].star.as_ref().map(|s| s.star), Some(2));

    let mut r = ProgressionRecord::new("u1");
    r.action_counts.insert("roadmap_complete".into(), 3);
    let met: Vec<_> = defs.iter().map(|d| d.condition.evaluate(&r).unwrap()).collect();
    assert_eq!(met, vec![true, true, false]);
  }

  #[test]
  fn tiered_validation() {
    assert!(tiered(vec![]).validate().is_err());
    assert!(tiered(vec![star(1, 10, 5), star(2, 5, 5)]).validate().is_err(), "requirements must grow");
    assert!(tiered(vec![star(2, 1, 5), star(2, 3, 5)]).validate().is_err());
    assert!(tiered(vec![star(6, 1, 5)]).validate().is_err());
    assert!(tiered(vec![star(5, 1, 5_000)]).validate().is_ok(), "single-star specials");
  }

  #[test]
  fn tiered_from_toml() {
    let t: TieredAchievement = toml::from_str(
      r#"
        id = "influencer"
        title = "Knowledge Sharer"
        category = "social"
        rarity = "rare"
        metric = { kind = "action_count", action_type = "post_create" }
        stars = [
          { star = 1, requirement = 1, xp_reward = 100 },
          { star = 2, requirement = 5, xp_reward = 250 },
        ]
      "#,
    )
    .unwrap();
    assert_eq!(t.rarity, Rarity::Rare);
    assert_eq!(t.metric, Metric::ActionCount { action_type: "post_create".into() });
    assert!(t.validate().is_ok());
  }

  #[test]
  fn conditions_deserialize_from_toml() {
    let def: AchievementDefinition = toml::from_str(
      r#"
        id = "lessons_25"
        title = "Bookworm Jr."
        xp_reward = 120
        condition = { kind = "action_count_at_least", action_type = "lesson_complete", value = 25 }
      "#,
    )
    .unwrap();
    let mut r = ProgressionRecord::new("u1");
    assert_eq!(def.condition.evaluate(&r), Ok(false));
    r.action_counts.insert("lesson_complete".into(), 25);
    assert_eq!(def.condition.evaluate(&r), Ok(true));
  }
}
