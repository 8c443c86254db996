//! Logging configuration for bookstore-queries.
//!
//! The report goes to stdout, so logs are written to stderr to keep the two
//! separable.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset. The driver's own spans are noisy
/// at `info`, so they are held back to `warn`.
const DEFAULT_FILTER: &str = "info,mongodb=warn";

/// Initializes logging to stderr.
///
/// Respects `RUST_LOG`; falls back to `DEFAULT_FILTER`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
