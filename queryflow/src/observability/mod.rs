//! Tracing subscriber setup.
//!
//! Logs always go to stderr. Stdout is reserved for the answer, or for the
//! JSON-RPC stream when serving stages.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Human-readable by default, JSON lines
/// when `json` is set.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
