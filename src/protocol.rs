//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::achievements::TieredStatus;
use crate::domain::{AchievementCategory, AchievementDefinition, DailyChallengeInstance, Rarity, StarLevel};
use crate::engine::{ActionOutcome, ChallengeOutcome, LeaderboardEntry, SubjectProgress};
use crate::levels::LevelProgress;

/// DTO for catalog entries; the unlock condition stays server-side.
#[derive(Debug, Serialize)]
pub struct AchievementOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub xp_reward: u64,
    /// Star entries only: the tiered achievement they belong to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub star: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AchievementCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
}

pub fn achievement_out(d: &AchievementDefinition) -> AchievementOut {
    AchievementOut {
        id: d.id.clone(),
        title: d.title.clone(),
        description: d.description.clone(),
        icon: d.icon.clone(),
        xp_reward: d.xp_reward,
        family: d.star.as_ref().map(|s| s.family.clone()),
        star: d.star.as_ref().map(|s| s.star),
        category: d.star.as_ref().map(|s| s.category),
        rarity: d.star.as_ref().map(|s| s.rarity),
    }
}

#[derive(Debug, Serialize)]
pub struct TieredOut {
    pub id: String,
    pub title: String,
    pub category: AchievementCategory,
    pub rarity: Rarity,
    pub progress: u64,
    pub stars_earned: Vec<u8>,
    pub next_star: Option<StarLevel>,
    pub xp_earned: u64,
}

impl From<TieredStatus> for TieredOut {
    fn from(t: TieredStatus) -> Self {
        Self {
            id: t.id,
            title: t.title,
            category: t.category,
            rarity: t.rarity,
            progress: t.progress,
            stars_earned: t.stars_earned,
            next_star: t.next_star,
            xp_earned: t.xp_earned,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionIn {
    #[serde(rename = "actionType")]
    pub action_type: String,
    #[serde(rename = "baseXp")]
    pub base_xp: i64,
}

#[derive(Debug, Serialize)]
pub struct ActionOut {
    pub xp_gained: u64,
    pub leveled_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    pub tier_changed: bool,
    pub unlocked_achievements: Vec<AchievementOut>,
    pub current_streak_days: u32,
    pub streak_extended: bool,
    pub streak_milestone_bonus: u64,
    pub total_xp: u64,
}

impl From<ActionOutcome> for ActionOut {
    fn from(o: ActionOutcome) -> Self {
        Self {
            xp_gained: o.xp_gained,
            leveled_up: o.leveled_up,
            new_level: o.new_level,
            tier_changed: o.tier_changed,
            unlocked_achievements: o.unlocked_achievements.iter().map(achievement_out).collect(),
            current_streak_days: o.current_streak_days,
            streak_extended: o.streak_extended,
            streak_milestone_bonus: o.streak_milestone_bonus,
            total_xp: o.total_xp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvanceIn {
    #[serde(rename = "actionType")]
    pub action_type: String,
    #[serde(rename = "incrementBy", default = "default_increment")]
    pub increment_by: i64,
}

fn default_increment() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct ChallengesOut {
    pub date: String,
    pub challenges: Vec<DailyChallengeInstance>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceOut {
    pub xp_gained: u64,
    pub completed_challenges: Vec<DailyChallengeInstance>,
    pub unlocked_achievements: Vec<AchievementOut>,
    pub leveled_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    pub challenges: ChallengesOut,
}

impl From<ChallengeOutcome> for AdvanceOut {
    fn from(o: ChallengeOutcome) -> Self {
        Self {
            xp_gained: o.xp_gained,
            unlocked_achievements: o.unlocked_achievements.iter().map(achievement_out).collect(),
            completed_challenges: o.completed_challenges,
            leveled_up: o.leveled_up,
            new_level: o.new_level,
            challenges: ChallengesOut { date: o.challenges.date, challenges: o.challenges.challenges },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub subject_id: String,
    pub level: LevelProgress,
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    pub streak_multiplier: f64,
    pub last_activity_date: String,
    pub total_actions_count: u64,
    pub action_counts: BTreeMap<String, u64>,
    pub unlocked_achievements: Vec<AchievementOut>,
    pub tiered_achievements: Vec<TieredOut>,
}

impl From<SubjectProgress> for ProgressOut {
    fn from(p: SubjectProgress) -> Self {
        Self {
            tiered_achievements: p.tiered.into_iter().map(Into::into).collect(),
            unlocked_achievements: p.unlocked_achievements.iter().map(achievement_out).collect(),
            subject_id: p.subject_id,
            level: p.level,
            current_streak_days: p.current_streak_days,
            longest_streak_days: p.longest_streak_days,
            streak_multiplier: p.streak_multiplier,
            last_activity_date: p.last_activity_date,
            total_actions_count: p.total_actions_count,
            action_counts: p.action_counts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntryOut {
    pub rank: usize,
    pub subject_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub current_streak_days: u32,
}

impl From<LeaderboardEntry> for LeaderboardEntryOut {
    fn from(e: LeaderboardEntry) -> Self {
        Self {
            rank: e.rank,
            subject_id: e.subject_id,
            total_xp: e.total_xp,
            level: e.level,
            current_streak_days: e.current_streak_days,
        }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: &'static str,
    pub message: String,
}
