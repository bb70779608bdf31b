//! # Tracing Initialization
//!
//! Called once by whatever surface embeds the settlement pipeline.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Filter examples:
/// - `RUST_LOG=debug` - Show all debug logs
/// - `RUST_LOG=fogon=trace` - Trace for fogon crates only
/// - Default: INFO, with fogon crates at DEBUG and sqlx quieted
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fogon=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
