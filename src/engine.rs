//! The progression engine: read-modify-write over the record store.
//!
//! Every public operation loads the subject's record, computes the next state with the
//! pure functions in `levels`, `streak`, `achievements` and `challenges`, and saves the
//! whole record once. If any step fails nothing is saved.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info, instrument, warn};

use crate::achievements::{self, Catalog, TieredStatus};
use crate::challenges::{self, sanitize_templates};
use crate::config::EngineSettings;
use crate::domain::{
  conversation_subject_id, AchievementDefinition, ChallengeTemplate, DailyChallengeInstance, DailyChallengeSet,
  ProgressionRecord,
};
use crate::error::{EngineError, EngineResult};
use crate::levels::{level_change, level_progress, non_negative_xp, LevelProgress};
use crate::seeds::MESSAGE_SENT;
use crate::store::{Clock, RecordStore};
use crate::streak::{self, apply_multiplier, milestone_reward, streak_multiplier, StreakChange};

/// Combined result of one qualifying action, for a single notification.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
  /// Base XP (after multiplier) + streak bonuses + achievement rewards.
  pub xp_gained: u64,
  pub leveled_up: bool,
  /// Set only when `leveled_up`.
  pub new_level: Option<u32>,
  pub tier_changed: bool,
  pub unlocked_achievements: Vec<AchievementDefinition>,
  pub current_streak_days: u32,
  pub streak_extended: bool,
  /// One-time bonus for reaching a streak milestone for the first time; 0 otherwise.
  pub streak_milestone_bonus: u64,
  pub total_xp: u64,
}

#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
  pub xp_gained: u64,
  pub completed_challenges: Vec<DailyChallengeInstance>,
  pub unlocked_achievements: Vec<AchievementDefinition>,
  pub leveled_up: bool,
  pub new_level: Option<u32>,
  pub challenges: DailyChallengeSet,
}

#[derive(Debug)]
pub struct SubjectProgress {
  pub subject_id: String,
  pub level: LevelProgress,
  pub current_streak_days: u32,
  pub longest_streak_days: u32,
  pub streak_multiplier: f64,
  pub last_activity_date: String,
  pub total_actions_count: u64,
  pub action_counts: BTreeMap<String, u64>,
  /// Catalog order.
  pub unlocked_achievements: Vec<AchievementDefinition>,
  pub tiered: Vec<TieredStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
  pub rank: usize,
  pub subject_id: String,
  pub total_xp: u64,
  pub level: u32,
  pub current_streak_days: u32,
}

pub struct ProgressionEngine {
  store: Arc<dyn RecordStore>,
  clock: Arc<dyn Clock>,
  catalog: Catalog,
  templates: Vec<ChallengeTemplate>,
  settings: EngineSettings,
}

impl ProgressionEngine {
  pub fn new(
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    catalog: Catalog,
    templates: Vec<ChallengeTemplate>,
    settings: EngineSettings,
  ) -> Self {
    Self { store, clock, catalog, templates: sanitize_templates(templates), settings }
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  /// Load a record, or start a fresh one for a subject never seen before.
  async fn load_or_new(&self, subject_id: &str) -> EngineResult<ProgressionRecord> {
    if subject_id.trim().is_empty() {
      return Err(EngineError::invalid("subject id must not be empty"));
    }
    match self.store.load(subject_id).await {
      Ok(r) => self.checked(r.migrate()?, subject_id),
      Err(EngineError::NotFound(_)) => {
        debug!(target: "progression", subject = %subject_id, "No record yet; starting fresh");
        Ok(ProgressionRecord::new(subject_id))
      }
      Err(e) => Err(e),
    }
  }

  fn checked(&self, record: ProgressionRecord, subject_id: &str) -> EngineResult<ProgressionRecord> {
    let malformed = |reason: String| EngineError::MalformedRecord { subject_id: subject_id.to_string(), reason };
    if record.subject_id != subject_id {
      return Err(malformed(format!("stored under '{}'", record.subject_id)));
    }
    record.check_invariants().map_err(malformed)?;
    Ok(record)
  }

  async fn commit(&self, mut record: ProgressionRecord) -> EngineResult<ProgressionRecord> {
    record.revision += 1;
    if let Err(e) = self.store.save(&record).await {
      warn!(target: "progression", subject = %record.subject_id, error = %e, kind = e.kind(), "Record save failed; nothing persisted");
      return Err(e);
    }
    Ok(record)
  }

  /// Record one qualifying action worth `base_xp`.
  #[instrument(level = "info", skip(self), fields(subject = %subject_id))]
  pub async fn record_action(&self, subject_id: &str, action_type: &str, base_xp: i64) -> EngineResult<ActionOutcome> {
    let base_xp = non_negative_xp(base_xp)?;
    if action_type.trim().is_empty() {
      return Err(EngineError::invalid("action type must not be empty"));
    }
    let today = self.clock.today();
    let current = self.load_or_new(subject_id).await?;
    let mut next = current.clone();

    let change = streak::record_activity(&mut next, today)?;
    let streak_bonus = if change == StreakChange::Continued { self.settings.streak_continuation_bonus } else { 0 };
    let milestone_bonus = if self.settings.apply_streak_milestones {
      milestone_reward(current.longest_streak_days, next.current_streak_days)
    } else {
      0
    };
    let overflow = || EngineError::invalid(format!("XP for base amount {base_xp} overflows"));
    let action_xp = if self.settings.apply_streak_multiplier {
      apply_multiplier(base_xp, next.current_streak_days).ok_or_else(overflow)?
    } else {
      base_xp
    };
    let earned = action_xp
      .checked_add(streak_bonus)
      .and_then(|xp| xp.checked_add(milestone_bonus))
      .ok_or_else(overflow)?;

    next.total_actions_count += 1;
    *next.action_counts.entry(action_type.to_string()).or_insert(0) += 1;
    next.grant_xp(earned)?;

    let eval = achievements::evaluate(&mut next, &self.catalog)?;
    let saved = self.commit(next).await?;

    let lc = level_change(current.total_xp, saved.total_xp);
    let predicate_failures = eval.failures.len();
    let outcome = ActionOutcome {
      xp_gained: saved.total_xp - current.total_xp,
      leveled_up: lc.leveled_up,
      new_level: lc.leveled_up.then_some(lc.new_level),
      tier_changed: lc.tier_changed,
      unlocked_achievements: eval.unlocked,
      current_streak_days: saved.current_streak_days,
      streak_extended: change == StreakChange::Continued,
      streak_milestone_bonus: milestone_bonus,
      total_xp: saved.total_xp,
    };
    info!(
      target: "progression",
      subject = %subject_id,
      %action_type,
      xp_gained = outcome.xp_gained,
      total_xp = outcome.total_xp,
      old_level = lc.old_level,
      level = saved.level,
      leveled_up = outcome.leveled_up,
      streak = outcome.current_streak_days,
      unlocked = outcome.unlocked_achievements.len(),
      predicate_failures,
      "Action recorded"
    );
    Ok(outcome)
  }

  /// A message sent by `user_id` in `conversation_id`, tracked per conversation.
  pub async fn record_conversation_message(&self, conversation_id: &str, user_id: &str) -> EngineResult<ActionOutcome> {
    if conversation_id.is_empty() || user_id.is_empty() {
      return Err(EngineError::invalid("conversation and user ids must not be empty"));
    }
    let subject = conversation_subject_id(conversation_id, user_id);
    let base_xp = i64::try_from(self.settings.message_base_xp).unwrap_or(i64::MAX);
    self.record_action(&subject, MESSAGE_SENT, base_xp).await
  }

  /// Today's challenge set, generated on the first call of the day.
  #[instrument(level = "info", skip(self), fields(subject = %subject_id))]
  pub async fn get_or_create_today_challenges(&self, subject_id: &str) -> EngineResult<DailyChallengeSet> {
    let today = self.clock.today();
    let mut record = self.load_or_new(subject_id).await?;
    let generated = challenges::ensure_today(
      &mut record,
      today,
      &self.templates,
      self.settings.daily_challenge_count,
      self.settings.challenge_history_days,
    )?;
    if generated {
      record = self.commit(record).await?;
    }
    todays_set(record)
  }

  /// Advance every open challenge of `action_type` by `increment_by`.
  #[instrument(level = "info", skip(self), fields(subject = %subject_id))]
  pub async fn advance_challenge(&self, subject_id: &str, action_type: &str, increment_by: i64) -> EngineResult<ChallengeOutcome> {
    if increment_by < 0 {
      return Err(EngineError::invalid(format!("increment must be non-negative, got {increment_by}")));
    }
    if action_type.trim().is_empty() {
      return Err(EngineError::invalid("action type must not be empty"));
    }
    let increment = u32::try_from(increment_by).unwrap_or(u32::MAX);
    let today = self.clock.today();
    let current = self.load_or_new(subject_id).await?;
    let mut next = current.clone();

    challenges::ensure_today(
      &mut next,
      today,
      &self.templates,
      self.settings.daily_challenge_count,
      self.settings.challenge_history_days,
    )?;
    let adv = match next.daily_challenges.as_mut() {
      Some(set) => challenges::advance(set, action_type, increment),
      None => challenges::AdvanceOutcome::default(),
    };

    let mut unlocked = Vec::new();
    if adv.xp_reward > 0 {
      next.grant_xp(adv.xp_reward)?;
      unlocked = achievements::evaluate(&mut next, &self.catalog)?.unlocked;
    }

    let saved = if next != current { self.commit(next).await? } else { next };
    let xp_gained = saved.total_xp - current.total_xp;
    let lc = level_change(current.total_xp, saved.total_xp);
    if !adv.completed.is_empty() {
      info!(target: "challenge", subject = %subject_id, %action_type, completed = adv.completed.len(), xp_gained, "Daily challenges completed");
    }
    Ok(ChallengeOutcome {
      xp_gained,
      completed_challenges: adv.completed,
      unlocked_achievements: unlocked,
      leveled_up: lc.leveled_up,
      new_level: lc.leveled_up.then_some(lc.new_level),
      challenges: todays_set(saved)?,
    })
  }

  /// Read-only view of a subject's progression.
  #[instrument(level = "debug", skip(self), fields(subject = %subject_id))]
  pub async fn progress(&self, subject_id: &str) -> EngineResult<SubjectProgress> {
    let record = self.store.load(subject_id).await?;
    let r = self.checked(record.migrate()?, subject_id)?;
    let unlocked = self
      .catalog
      .iter()
      .filter(|d| r.unlocked_achievement_ids.contains(&d.id))
      .cloned()
      .collect();
    Ok(SubjectProgress {
      tiered: self.catalog.tiered_status(&r),
      level: level_progress(r.total_xp),
      streak_multiplier: streak_multiplier(r.current_streak_days),
      current_streak_days: r.current_streak_days,
      longest_streak_days: r.longest_streak_days,
      last_activity_date: r.last_activity_date,
      total_actions_count: r.total_actions_count,
      action_counts: r.action_counts,
      unlocked_achievements: unlocked,
      subject_id: r.subject_id,
    })
  }

  /// All records in leaderboard order: total XP descending, ties broken by subject id.
  async fn ranked(&self) -> EngineResult<Vec<ProgressionRecord>> {
    let mut records = self.store.list().await?;
    records.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then_with(|| a.subject_id.cmp(&b.subject_id)));
    Ok(records)
  }

  /// Top subjects by total XP.
  #[instrument(level = "debug", skip(self))]
  pub async fn leaderboard(&self, limit: usize) -> EngineResult<Vec<LeaderboardEntry>> {
    Ok(self.ranked().await?.into_iter().take(limit).enumerate().map(leaderboard_entry).collect())
  }

  /// Leaderboard position of one subject.
  #[instrument(level = "debug", skip(self))]
  pub async fn rank(&self, subject_id: &str) -> EngineResult<LeaderboardEntry> {
    self
      .ranked()
      .await?
      .into_iter()
      .enumerate()
      .find(|(_, r)| r.subject_id == subject_id)
      .map(leaderboard_entry)
      .ok_or_else(|| EngineError::NotFound(subject_id.to_string()))
  }
}

fn leaderboard_entry((i, r): (usize, ProgressionRecord)) -> LeaderboardEntry {
  LeaderboardEntry {
    rank: i + 1,
    level: r.level,
    total_xp: r.total_xp,
    current_streak_days: r.current_streak_days,
    subject_id: r.subject_id,
  }
}

fn todays_set(record: ProgressionRecord) -> EngineResult<DailyChallengeSet> {
  record.daily_challenges.ok_or_else(|| EngineError::MalformedRecord {
    subject_id: record.subject_id.clone(),
    reason: "no daily challenge set after generation".into(),
  })
}
