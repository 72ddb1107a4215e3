//! Tracing setup for test binaries.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `trellis_test=debug`.
pub const LOG_ENV: &str = "TRELLIS_LOG";

/// Default filter when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Installs a fmt subscriber writing through the test harness's capture.
///
/// Call at the top of integration tests. Uses `try_init`, so calling it from
/// every test is fine; only the first call installs the subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
