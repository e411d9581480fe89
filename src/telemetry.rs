//! Tracing subscriber setup for binaries

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a `fmt` subscriber on stderr.
///
/// The filter comes from `RUST_LOG`; without it, `warehouse_reconcile` logs at
/// `default_level`. Calling this twice leaves the first subscriber in place.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("warehouse_reconcile={default_level}").into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
