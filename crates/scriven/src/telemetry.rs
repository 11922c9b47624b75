//! Logging initialization.
//!
//! The worker and engine layers emit `tracing` spans and events; the
//! database layer uses `log` macros. `init_logging` installs a fmt
//! subscriber with an env-filter and bridges `log` records into the
//! tracing pipeline so both show up in one stream.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes logging for binaries embedding this crate.
///
/// `default_filter` is used when `RUST_LOG` is not set (e.g. `"info"` or
/// `"scriven=debug,info"`). Safe to call once per process; subsequent
/// calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Errors here mean a subscriber/logger is already installed.
    let _ = tracing_log::LogTracer::init();
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
