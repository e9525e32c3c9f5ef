//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Catalogs and pure lookups
        .route("/api/v1/achievements", get(http::http_list_achievements))
        .route("/api/v1/achievements/:id", get(http::http_get_achievement))
        .route("/api/v1/levels/:xp", get(http::http_get_level))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
        // Per-subject progression
        .route("/api/v1/subjects/:subject_id/progress", get(http::http_get_progress))
        .route("/api/v1/subjects/:subject_id/rank", get(http::http_get_rank))
        .route("/api/v1/subjects/:subject_id/actions", post(http::http_post_action))
        .route("/api/v1/subjects/:subject_id/challenges", get(http::http_get_challenges))
        .route("/api/v1/subjects/:subject_id/challenges/advance", post(http::http_post_advance))
        .route(
            "/api/v1/conversations/:conversation_id/members/:user_id/messages",
            post(http::http_post_conversation_message),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
