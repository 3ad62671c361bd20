//! Development-time tracing for debugging the loop.
//!
//! Diagnostics go to stderr via `RUST_LOG` and are never part of the
//! product output; the loop's durable record is the state file and the
//! observer notifications, which are unaffected by this module.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for development logging.
///
/// Reads `RUST_LOG`, defaulting to `warn` when unset. Output goes to
/// stderr in compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=planloop=debug planloop run --plan plan.md
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
