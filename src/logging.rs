// ==========================================
// Logging setup
// ==========================================
// tracing + tracing-subscriber, filtered by RUST_LOG
// or the configured filter
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// # Filters
/// - RUST_LOG wins when set, e.g. `RUST_LOG=replog=debug`
/// - otherwise `filter` (from `REPLOG_LOG` or the config default)
pub fn init(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Test subscriber; safe to call from every test
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
