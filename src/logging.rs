//! Diagnostic subscriber setup for embedders
//!
//! Library code only emits `tracing` events and never installs a
//! subscriber; embedders (and the integration tests) that want to see the
//! diagnostics call [`init`] once at startup.

use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Install the diagnostic subscriber
///
/// The level is taken from the `LOG_LEVEL` environment variable, falling
/// back to `TRACE` in debug builds and `INFO` otherwise. Only this crate's
/// own targets are emitted.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init() {
    let default = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let level = std::env::var("LOG_LEVEL").map_or(default, |level| {
        LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    });

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("beacon")
                })),
        )
        .init();
}
