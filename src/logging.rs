//! `tracing` subscriber setup.
//!
//! Log level comes from `RUST_LOG`, falling back to `info`. Per frame diagnostics
//! (resyncs, CRC failures, sequence gaps) are emitted at `debug`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const DEFAULT_FILTER: &str = "info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber, human readable on stderr.
///
/// Call once early in `main()`, a second call is ignored.
pub fn init() {
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Subscriber for tests, output goes through the test harness capture.
///
/// Safe to call from every test.
pub fn init_for_tests() {
    let layer = fmt::layer()
        .with_test_writer()
        .with_filter(env_filter("debug"));

    let _ = tracing_subscriber::registry().with(layer).try_init();
}
