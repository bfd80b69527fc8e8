//! Structured logging for sc-core.
//!
//! Two modes, both on stderr:
//! - human-readable console output for interactive use
//! - JSONL for agents and log shippers
//!
//! Events carry a stable name in their `event` field (see [`event_names`]).
//! Pass and node correlation comes from the `pass` and `node` spans the
//! manager and aggregator open, so call sites only add what is local to them.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn default_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::new(format!(
        "sc_core={level},sc_config={level}",
        level = config.level
    ))
}

/// Install the global subscriber. Call once, before anything logs.
///
/// `RUST_LOG`, when set to a valid directive, replaces the level-derived filter.
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .is_ok()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
                    .is_ok()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init()
            .is_ok(),
    }
}
