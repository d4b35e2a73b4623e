//! Tracing subscriber setup for Waymark binaries.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g.
/// `"waymark=info"`) decides what is logged.
///
/// # Errors
/// If a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
