//! Loading engine configuration (tuning knobs + extra achievements and challenge
//! templates) from TOML.
//!
//! See `ProgressionConfig` and `EngineSettings` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{AchievementDefinition, ChallengeTemplate, TieredAchievement};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProgressionConfig {
  #[serde(default)]
  pub engine: EngineSettings,
  /// Appended to the built-in catalog; ids already present are skipped.
  #[serde(default)]
  pub achievements: Vec<AchievementDefinition>,
  /// Appended after the built-in tiered achievements.
  #[serde(default)]
  pub tiered_achievements: Vec<TieredAchievement>,
  /// Appended to the built-in daily challenge templates.
  #[serde(default)]
  pub challenge_templates: Vec<ChallengeTemplate>,
}

/// Engine tuning. Every field is optional in TOML.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
  /// XP granted when an action extends the streak to a new day.
  pub streak_continuation_bonus: u64,
  /// Scale base action XP by the streak multiplier.
  pub apply_streak_multiplier: bool,
  /// Pay the one-time bonus when a streak first reaches 7, 30, 90, 180 or 365 days.
  pub apply_streak_milestones: bool,
  pub daily_challenge_count: usize,
  /// How many superseded daily sets a record keeps.
  pub challenge_history_days: usize,
  /// Base XP of a conversation message.
  pub message_base_xp: u64,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      streak_continuation_bonus: 10,
      apply_streak_multiplier: true,
      apply_streak_milestones: true,
      daily_challenge_count: 3,
      challenge_history_days: 30,
      message_base_xp: 5,
    }
  }
}

/// Attempt to load `ProgressionConfig` from PROGRESSION_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<ProgressionConfig> {
  let path = std::env::var("PROGRESSION_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ProgressionConfig>(&s) {
      Ok(cfg) => {
        info!(target: "progression_backend", %path, achievements = cfg.achievements.len(), templates = cfg.challenge_templates.len(), "Loaded progression config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "progression_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "progression_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
