//! Tracing setup.
//!
//! Logs go to stdout through the `fmt` layer with targets and levels shown.
//! The level comes from `LOG_LEVEL`.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Parse a level name, falling back to INFO for anything unrecognised
pub fn parse_level_filter(level: &str) -> LevelFilter {
    match level.trim() {
        "" => LevelFilter::INFO,
        level => level.parse().unwrap_or(LevelFilter::INFO),
    }
}

/// Install the global subscriber
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(parse_level_filter(level))
        .init();
}
