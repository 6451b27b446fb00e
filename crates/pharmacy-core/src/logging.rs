//! Logging setup built on `tracing` and `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// # Environment
/// - `RUST_LOG`: filter directives (default: `info`),
///   e.g. `RUST_LOG=pharmacy_core=debug`
///
/// Does nothing if a subscriber is already installed.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Subscriber for tests: debug level, output captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
