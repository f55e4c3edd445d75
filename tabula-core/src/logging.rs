//! Global `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global log subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Calling this twice
/// is harmless; the second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
