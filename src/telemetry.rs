//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL holds EnvFilter directives, e.g. "debug" or
//!   "info,progression=debug,achievement=trace,tower_http=warn".
//! - LOG_FORMAT picks the output: "json", "compact", or the full format (default).
//!
//! Engine events use the targets `progression`, `achievement` and `challenge`;
//! startup and request failures use `progression_backend`. The tower-http TraceLayer
//! adds per-request spans around them.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,progression=debug,achievement=debug,challenge=debug,progression_backend=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Full,
    Compact,
    Json,
}

fn log_format(raw: Option<&str>) -> LogFormat {
    match raw.map(str::trim) {
        Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
        Some(f) if f.eq_ignore_ascii_case("compact") => LogFormat::Compact,
        _ => LogFormat::Full,
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Each format yields a different subscriber type, so init inside each arm.
    let result = match log_format(std::env::var("LOG_FORMAT").ok().as_deref()) {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Full => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
