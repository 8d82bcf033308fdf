//! Tracing setup.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the embedder's choice. `init` wires an env-filtered fmt pipeline for
//! binaries and examples that want the default.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a global fmt subscriber.
///
/// Verbosity maps 0 to warn, 1 to info, 2 to debug, 3+ to trace; the `LOG`
/// environment variable overrides it with a full filter expression.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .with_env_var("LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .init();
}

/// Best-effort subscriber for tests: captured output, no panic when a
/// subscriber is already installed.
pub fn try_init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn level_from_verbosity(verbosity: u8) -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
