//! Built-in content: the default achievement catalog and daily challenge templates.

use crate::domain::{
  AchievementCategory, AchievementDefinition, ChallengeTemplate, Condition, CustomPredicate, Metric, Rarity, StarLevel,
  TieredAchievement,
};

pub const LESSON_COMPLETE: &str = "lesson_complete";
pub const QUIZ_COMPLETE: &str = "quiz_complete";
pub const ROADMAP_GENERATE: &str = "roadmap_generate";
pub const ROADMAP_COMPLETE: &str = "roadmap_complete";
pub const PROJECT_CREATE: &str = "project_create";
pub const MESSAGE_SENT: &str = "message_sent";
pub const POST_CREATE: &str = "post_create";

fn achievement(id: &str, title: &str, description: &str, icon: &str, xp_reward: u64, condition: Condition) -> AchievementDefinition {
  AchievementDefinition {
    id: id.into(),
    title: title.into(),
    description: description.into(),
    icon: icon.into(),
    xp_reward,
    condition,
    star: None,
  }
}

fn action_count(action_type: &str, value: u64) -> Condition {
  Condition::ActionCountAtLeast { action_type: action_type.into(), value }
}

// Distinct action types only ever grow, so this stays monotone.
fn distinct_actions(min: usize) -> Condition {
  Condition::Custom {
    predicate: CustomPredicate::new("distinct_actions", move |r| Ok(r.action_counts.values().filter(|n| **n > 0).count() >= min)),
  }
}

fn xp(value: u64) -> Condition {
  Condition::TotalXpAtLeast { value }
}

fn streak(value: u32) -> Condition {
  Condition::LongestStreakAtLeast { value }
}

/// Declaration order here is the order unlocks are reported in.
pub fn seed_achievements() -> Vec<AchievementDefinition> {
  vec![
    achievement("first_action", "Getting Started", "Complete your first activity", "👋", 10, Condition::ActionsAtLeast { value: 1 }),
    achievement("xp_100", "First Steps", "Earn 100 XP", "🌱", 25, xp(100)),
    achievement("xp_500", "Rising Star", "Earn 500 XP", "⭐", 50, xp(500)),
    achievement("xp_1000", "Knowledge Seeker", "Earn 1,000 XP", "🔥", 100, xp(1_000)),
    achievement("xp_5000", "Expert Learner", "Earn 5,000 XP", "💎", 250, xp(5_000)),
    achievement("xp_10000", "Master", "Earn 10,000 XP", "👑", 500, xp(10_000)),
    achievement("level_5", "Level Up", "Reach level 5", "🆙", 200, Condition::LevelAtLeast { value: 5 }),
    achievement("streak_3", "Consistent", "Reach a 3-day streak", "🔥", 50, streak(3)),
    achievement("streak_7", "Dedicated", "Reach a 7-day streak", "⚡", 100, streak(7)),
    achievement("streak_30", "Unstoppable", "Reach a 30-day streak", "🚀", 300, streak(30)),
    achievement("streak_100", "Legend", "Reach a 100-day streak", "🏆", 1_000, streak(100)),
    achievement("actions_100", "Chatterbox", "Complete 100 activities", "💬", 150, Condition::ActionsAtLeast { value: 100 }),
    achievement("lessons_10", "Quick Learner", "Complete 10 lessons", "📚", 100, action_count(LESSON_COMPLETE, 10)),
    achievement("lessons_50", "Bookworm", "Complete 50 lessons", "📖", 250, action_count(LESSON_COMPLETE, 50)),
    achievement("lessons_100", "Scholar", "Complete 100 lessons", "🎓", 500, action_count(LESSON_COMPLETE, 100)),
    achievement("roadmaps_1", "Pathfinder", "Complete 1 roadmap", "🗺️", 200, action_count(ROADMAP_COMPLETE, 1)),
    achievement("roadmaps_5", "Explorer", "Complete 5 roadmaps", "🧭", 400, action_count(ROADMAP_COMPLETE, 5)),
    achievement("roadmaps_10", "Adventurer", "Complete 10 roadmaps", "🌟", 800, action_count(ROADMAP_COMPLETE, 10)),
    achievement("projects_1", "Builder", "Create 1 project", "🔨", 100, action_count(PROJECT_CREATE, 1)),
    achievement("projects_5", "Creator", "Create 5 projects", "🎨", 250, action_count(PROJECT_CREATE, 5)),
    achievement("projects_10", "Architect", "Create 10 projects", "🏗️", 500, action_count(PROJECT_CREATE, 10)),
    achievement("messages_100", "Conversation Starter", "Send 100 messages", "✉️", 150, action_count(MESSAGE_SENT, 100)),
    achievement("well_rounded", "Well Rounded", "Try 3 different kinds of activity", "🎯", 75, distinct_actions(3)),
  ]
}

fn stars(levels: &[(u64, u64)]) -> Vec<StarLevel> {
  (1u8..).zip(levels).map(|(star, &(requirement, xp_reward))| StarLevel { star, requirement, xp_reward }).collect()
}

#[allow(clippy::too_many_arguments)]
fn tiered(
  id: &str,
  title: &str,
  description: &str,
  icon: &str,
  category: AchievementCategory,
  rarity: Rarity,
  metric: Metric,
  levels: &[(u64, u64)],
) -> TieredAchievement {
  TieredAchievement {
    id: id.into(),
    title: title.into(),
    description: description.into(),
    icon: icon.into(),
    category,
    rarity,
    metric,
    stars: stars(levels),
  }
}

fn count_of(action_type: &str) -> Metric {
  Metric::ActionCount { action_type: action_type.into() }
}

/// Five-star achievements; stars are appended to the catalog after the plain entries.
pub fn seed_tiered_achievements() -> Vec<TieredAchievement> {
  use AchievementCategory::*;
  vec![
    tiered("pathfinder", "Pathfinder", "Generate roadmaps", "🗺️", Generation, Rarity::Common, count_of(ROADMAP_GENERATE),
      &[(1, 100), (3, 250), (10, 500), (50, 1_000), (100, 2_000)]),
    tiered("finisher", "Journey Complete", "Complete entire roadmaps", "✅", Completion, Rarity::Rare, count_of(ROADMAP_COMPLETE),
      &[(1, 200), (3, 400), (10, 800), (25, 1_600), (50, 3_200)]),
    tiered("consistency", "Dedicated Scholar", "Maintain learning streaks", "🔥", Engagement, Rarity::Epic, Metric::LongestStreak,
      &[(7, 100), (30, 300), (90, 900), (180, 1_800), (365, 3_600)]),
    tiered("explorer", "Curious Mind", "Work through lessons", "🌟", Engagement, Rarity::Common, count_of(LESSON_COMPLETE),
      &[(10, 50), (25, 150), (50, 400), (100, 1_000), (250, 2_500)]),
    tiered("influencer", "Knowledge Sharer", "Share posts with the community", "👥", Social, Rarity::Rare, count_of(POST_CREATE),
      &[(1, 100), (5, 250), (15, 600), (50, 1_500), (100, 3_000)]),
  ]
}

fn template(id: &str, title: &str, description: &str, action_type: &str, target: u32, xp_reward: u64) -> ChallengeTemplate {
  ChallengeTemplate {
    id: id.into(),
    title: title.into(),
    description: description.into(),
    action_type: action_type.into(),
    target,
    xp_reward,
  }
}

pub fn seed_challenge_templates() -> Vec<ChallengeTemplate> {
  vec![
    template("daily_lessons", "Lesson Sprint", "Complete 3 lessons today", LESSON_COMPLETE, 3, 50),
    template("daily_quiz", "Quiz Whiz", "Finish 2 quizzes today", QUIZ_COMPLETE, 2, 40),
    template("daily_messages", "Social Butterfly", "Send 5 messages today", MESSAGE_SENT, 5, 30),
    template("daily_roadmap", "Trailblazer", "Generate a new roadmap", ROADMAP_GENERATE, 1, 25),
    template("daily_post", "Share Your Journey", "Publish a post", POST_CREATE, 1, 20),
    template("daily_project", "Maker Mode", "Start a project", PROJECT_CREATE, 1, 60),
  ]
}
