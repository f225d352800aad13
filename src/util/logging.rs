// logsieve - util/logging.rs
//
// Structured logging init helper for binaries and tests embedding the crate.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - Explicit level passed by the host application
//
// Output: stderr. Never logs callback payloads at any level.

use tracing_subscriber::EnvFilter;

/// Initialise the logging subsystem.
///
/// `level` overrides the default when `RUST_LOG` is not set.
///
/// Priority: RUST_LOG env var > explicit level > default "info".
pub fn init(level: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if let Some(level) = level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .init();

    tracing::debug!(
        crate_name = super::constants::CRATE_NAME,
        version = super::constants::CRATE_VERSION,
        "Logging initialised"
    );
}
