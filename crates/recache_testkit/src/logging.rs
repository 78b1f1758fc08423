//! Test logging.

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `recache_core=debug`. Output goes through
/// the test harness so it only shows for failing tests.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recache_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
