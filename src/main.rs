//! Progression Backend · XP, levels, streaks, achievements and daily challenges
//!
//! - Axum HTTP API over the progression engine
//! - In-memory record store (revision-checked saves)
//! - Optional TOML config for engine tuning and extra catalog entries
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   PROGRESSION_CONFIG_PATH  : path to TOML config (engine settings, achievements, challenge templates)
//!   PROGRESSION_FIXED_DATE   : YYYY-MM-DD, pins the engine clock (otherwise UTC today)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "json", "compact", or full (default)

mod telemetry;
mod util;
mod error;
mod domain;
mod levels;
mod streak;
mod achievements;
mod challenges;
mod config;
mod seeds;
mod store;
mod engine;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Engine with catalogs, in-memory store and system clock.
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "progression_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "progression_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "progression_backend", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "progression_backend", "Shutdown signal received");
}
