//! Tracing setup for the command-line entry point.
//!
//! Diagnostics go to stderr so stdout carries only the JSON result document.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=upgrader=debug upgrader run --repository-url ... --base-branch main
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
