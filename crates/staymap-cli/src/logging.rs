#![forbid(unsafe_code)]

//! Tracing subscriber setup for the command-line tool.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` wins over `--log-level` when both are present.

use tracing_subscriber::EnvFilter;

const CRATES: [&str; 7] = [
    "staymap",
    "staymap_cli",
    "staymap_core",
    "staymap_panel",
    "staymap_render",
    "staymap_runtime",
    "staymap_sandbox",
];

/// Default directive when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_DIRECTIVE: &str = "staymap=info";

/// Build the filter from `RUST_LOG`, the CLI level, or the default.
#[must_use]
pub fn filter(level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = level.map_or_else(|| DEFAULT_DIRECTIVE.to_string(), directive_for);
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// A bare level like `debug` applies to every staymap crate; anything with
/// `=` or `,` is passed through as a full directive.
fn directive_for(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        CRATES
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(level: Option<&str>, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
