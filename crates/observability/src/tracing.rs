//! Tracing/logging initialization.
//!
//! JSON lines with timestamps, filtered through `RUST_LOG`. Long-running
//! hosts (schedulers, refresh jobs) call [`init`] once at startup; test
//! harnesses use [`init_with_default`] with a quieter floor.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the standard `info` floor.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default("info");
}

/// Initialize tracing, falling back to `default_directive` when `RUST_LOG`
/// is not set.
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
