//! Daily challenges: deterministic per-day generation and capped progress.
//!
//! State per subject and day: not generated -> active -> each challenge completed.
//! A set is generated lazily on the first read of a new day; the previous set is
//! moved into the record's history rather than dropped.

use std::collections::HashSet;

use chrono::NaiveDate;
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use tracing::{debug, error, info};

use crate::domain::{ChallengeTemplate, DailyChallengeInstance, DailyChallengeSet, ProgressionRecord};
use crate::error::{EngineError, EngineResult};
use crate::util::{format_day, parse_day, stable_hash};

/// Drop unusable templates (zero target, empty action, duplicate id) with an error log.
pub fn sanitize_templates(templates: Vec<ChallengeTemplate>) -> Vec<ChallengeTemplate> {
  let mut seen = HashSet::new();
  templates
    .into_iter()
    .filter(|t| {
      if t.target == 0 || t.action_type.is_empty() || t.id.is_empty() {
        error!(target: "challenge", id = %t.id, "Skipping challenge template: empty id/action or zero target");
        return false;
      }
      if !seen.insert(t.id.clone()) {
        error!(target: "challenge", id = %t.id, "Skipping duplicate challenge template id");
        return false;
      }
      true
    })
    .collect()
}

/// Pick `count` templates for `(subject_id, date)`. Same inputs, same set.
pub fn generate_set(subject_id: &str, date: NaiveDate, templates: &[ChallengeTemplate], count: usize) -> DailyChallengeSet {
  let date_s = format_day(date);
  let mut rng = StdRng::seed_from_u64(stable_hash(&[subject_id, &date_s]));
  let amount = count.min(templates.len());
  let mut picked = sample(&mut rng, templates.len(), amount).into_vec();
  picked.sort_unstable();
  DailyChallengeSet {
    date: date_s,
    challenges: picked.into_iter().map(|i| DailyChallengeInstance::from_template(&templates[i])).collect(),
  }
}

/// Make sure `record` holds the set for `today`. Returns true if a new set was generated.
pub fn ensure_today(
  record: &mut ProgressionRecord,
  today: NaiveDate,
  templates: &[ChallengeTemplate],
  count: usize,
  history_cap: usize,
) -> EngineResult<bool> {
  if let Some(current) = &record.daily_challenges {
    let current_date = parse_day(&current.date)?;
    if current_date == today {
      return Ok(false);
    }
    if current_date > today {
      return Err(EngineError::invalid(format!(
        "challenge set for {} is newer than today ({})",
        current.date,
        format_day(today)
      )));
    }
  }

  let fresh = generate_set(&record.subject_id, today, templates, count);
  info!(target: "challenge", subject = %record.subject_id, date = %fresh.date, count = fresh.challenges.len(), "Generated daily challenges");
  if let Some(old) = record.daily_challenges.replace(fresh) {
    record.challenge_history.push(old);
    let excess = record.challenge_history.len().saturating_sub(history_cap);
    record.challenge_history.drain(..excess);
  }
  Ok(true)
}

#[derive(Debug, Default)]
pub struct AdvanceOutcome {
  /// Challenges that reached their target in this call.
  pub completed: Vec<DailyChallengeInstance>,
  /// Sum of the rewards of `completed`.
  pub xp_reward: u64,
}

/// Add `increment_by` to every open challenge matching `action_type` exactly.
/// Progress is capped at the target; completed challenges are left alone.
pub fn advance(set: &mut DailyChallengeSet, action_type: &str, increment_by: u32) -> AdvanceOutcome {
  let mut out = AdvanceOutcome::default();
  for c in set.challenges.iter_mut().filter(|c| !c.completed && c.action_type == action_type) {
    c.progress = c.progress.saturating_add(increment_by).min(c.target);
    debug!(target: "challenge", id = %c.id, progress = c.progress, target = c.target, "Challenge advanced");
    if c.progress == c.target {
      c.completed = true;
      out.xp_reward = out.xp_reward.saturating_add(c.xp_reward);
      out.completed.push(c.clone());
    }
  }
  out
}
