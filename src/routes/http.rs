//! HTTP endpoint handlers. These are thin wrappers that forward to the engine.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::levels::{checked_level_progress, LevelProgress};
use crate::protocol::*;
use crate::state::AppState;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Engine error rendered as `{ "error": kind, "message": text }`.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      EngineError::InvalidArgument(_) | EngineError::MalformedRecord { .. } => StatusCode::BAD_REQUEST,
      EngineError::NotFound(_) => StatusCode::NOT_FOUND,
      EngineError::RevisionConflict { .. } => StatusCode::CONFLICT,
      EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      EngineError::UnsupportedSchema { .. } | EngineError::PredicateFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(target: "progression_backend", status = status.as_u16(), kind = self.0.kind(), error = %self.0, "Request failed");
    (status, Json(ErrorOut { error: self.0.kind(), message: self.0.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_achievements(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let out: Vec<AchievementOut> = state.engine.catalog().iter().map(achievement_out).collect();
  Json(out)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_achievement(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<AchievementOut> {
  let def = state.engine.catalog().get(&id)?;
  Ok(Json(achievement_out(def)))
}

#[instrument(level = "info")]
pub async fn http_get_level(Path(xp): Path<i64>) -> ApiResult<LevelProgress> {
  Ok(Json(checked_level_progress(xp)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntryOut>> {
  let limit = q.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).clamp(1, MAX_LEADERBOARD_LIMIT);
  let entries = state.engine.leaderboard(limit).await?;
  Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_rank(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
) -> ApiResult<LeaderboardEntryOut> {
  let entry = state.engine.rank(&subject_id).await?;
  Ok(Json(entry.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
) -> ApiResult<ProgressOut> {
  let p = state.engine.progress(&subject_id).await?;
  Ok(Json(p.into()))
}

#[instrument(level = "info", skip(state, body), fields(action_type = %body.action_type, base_xp = body.base_xp))]
pub async fn http_post_action(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Json(body): Json<ActionIn>,
) -> ApiResult<ActionOut> {
  let outcome = state.engine.record_action(&subject_id, &body.action_type, body.base_xp).await?;
  info!(target: "progression", subject = %subject_id, xp_gained = outcome.xp_gained, leveled_up = outcome.leveled_up, "HTTP action recorded");
  Ok(Json(outcome.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_conversation_message(
  State(state): State<Arc<AppState>>,
  Path((conversation_id, user_id)): Path<(String, String)>,
) -> ApiResult<ActionOut> {
  let outcome = state.engine.record_conversation_message(&conversation_id, &user_id).await?;
  Ok(Json(outcome.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_challenges(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
) -> ApiResult<ChallengesOut> {
  let set = state.engine.get_or_create_today_challenges(&subject_id).await?;
  info!(target: "challenge", subject = %subject_id, date = %set.date, count = set.challenges.len(), "HTTP challenges served");
  Ok(Json(ChallengesOut { date: set.date, challenges: set.challenges }))
}

#[instrument(level = "info", skip(state, body), fields(action_type = %body.action_type, increment_by = body.increment_by))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Json(body): Json<AdvanceIn>,
) -> ApiResult<AdvanceOut> {
  let outcome = state.engine.advance_challenge(&subject_id, &body.action_type, body.increment_by).await?;
  Ok(Json(outcome.into()))
}
