//! Application state: the progression engine wired to its store, clock and catalogs.
//!
//! This module owns:
//!   - the achievement catalog (built-in seeds + TOML additions)
//!   - the daily challenge templates (built-in seeds + TOML additions)
//!   - the record store and clock the engine runs against

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::achievements::Catalog;
use crate::config::{load_config_from_env, ProgressionConfig};
use crate::engine::ProgressionEngine;
use crate::seeds::{seed_achievements, seed_challenge_templates, seed_tiered_achievements};
use crate::store::{Clock, FixedClock, InMemoryStore, RecordStore, SystemClock};
use crate::util::parse_day;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProgressionEngine>,
}

impl AppState {
    /// Build state from env: load config, merge catalogs, in-memory store.
    /// `PROGRESSION_FIXED_DATE=YYYY-MM-DD` pins the clock (demos, replays); otherwise UTC today.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();
        Self::from_parts(cfg, Arc::new(InMemoryStore::new()), clock_from_env())
    }

    pub fn from_parts(cfg: ProgressionConfig, store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        // Built-in seeds first so config entries can't shadow their ids.
        let catalog = Catalog::new(seed_achievements().into_iter().chain(cfg.achievements))
            .with_tiered(seed_tiered_achievements().into_iter().chain(cfg.tiered_achievements));
        let mut templates = seed_challenge_templates();
        templates.extend(cfg.challenge_templates);

        info!(
            target: "progression_backend",
            achievements = catalog.len(),
            templates = templates.len(),
            daily_challenge_count = cfg.engine.daily_challenge_count,
            streak_multiplier = cfg.engine.apply_streak_multiplier,
            "Progression engine ready"
        );

        let engine = ProgressionEngine::new(store, clock, catalog, templates, cfg.engine);
        Self { engine: Arc::new(engine) }
    }
}

fn clock_from_env() -> Arc<dyn Clock> {
    let Ok(raw) = std::env::var("PROGRESSION_FIXED_DATE") else {
        return Arc::new(SystemClock);
    };
    match parse_day(&raw) {
        Ok(day) => {
            info!(target: "progression_backend", %day, "Clock pinned");
            Arc::new(FixedClock::new(day))
        }
        Err(e) => {
            warn!(target: "progression_backend", error = %e, "Ignoring PROGRESSION_FIXED_DATE; using system clock");
            Arc::new(SystemClock)
        }
    }
}
