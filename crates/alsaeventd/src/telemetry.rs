//! Logging setup.
//!
//! Everything goes to stderr through `tracing-subscriber`. The default
//! filter is `warn`, so a healthy daemon prints nothing.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

const FALLBACK_FILTER: &str = "warn";

/// Build the filter for `directive`, falling back to `warn` when it doesn't
/// parse.
pub fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
