//! `tracing` subscriber setup for binaries, benches and tests
//! that consume this crate. The library itself only emits events.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};
use tracing_subscriber::util::TryInitError;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber, or reports why it could not
/// (usually because one is already installed).
///
/// Honours `RUST_LOG`, defaulting to `info`. At `debug` the
/// per-channel spans are logged when they close, which gives a
/// rough timing of each channel.
pub fn try_init() -> Result<(), TryInitError> {
    let env_filter = env_filter();

    let is_debug = env_filter.to_string().contains("debug") ||
                   std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}

/// Like `try_init`, but a second call is a no-op.
pub fn init() {
    let _ = try_init();
}
