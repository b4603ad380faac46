//! Tracing subscriber setup for the host process

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Env var that switches output to JSON lines.
pub const JSON_ENV: &str = "CREDITSYNC_LOG_JSON";

/// Install the global `fmt` subscriber.
///
/// Honors `RUST_LOG`, defaulting to [`DEFAULT_FILTER`]. Returns `false` when a
/// subscriber was already installed, so calling this more than once is safe.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = if json_requested() {
        tracing_subscriber::fmt().with_env_filter(filter).json().with_current_span(true).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(json = json_requested(), "logging initialized");
            true
        }
        Err(_) => false,
    }
}

fn json_requested() -> bool {
    std::env::var(JSON_ENV)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
