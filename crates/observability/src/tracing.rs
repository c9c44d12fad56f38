//! Tracing/logging initialization.
//!
//! The engine emits structured events on every committed state change
//! (operation validated, transfer committed, adjustment committed) and on the
//! paths an operator cares about: demotions to waiting, lock timeouts, and
//! stock-view consistency violations.

use tracing_subscriber::EnvFilter;

/// Default filter: engine commits and warnings, quiet everything else.
const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process with the default filter,
/// overridable via `RUST_LOG`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Initialize with an explicit fallback filter (used by tests that want the
/// suppressed-adjustment debug events visible).
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
