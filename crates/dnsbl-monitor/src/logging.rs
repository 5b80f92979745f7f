//! Tracing subscriber setup.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single lines
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

/// Filter used when `RUST_LOG` is unset.
fn default_filter(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug,hickory_proto=warn,hickory_resolver=warn"
    } else {
        "info,hickory_proto=warn,hickory_resolver=warn"
    }
}

/// Install the global subscriber. Events go to stderr so reports printed
/// on stdout stay machine-readable.
///
/// `RUST_LOG` wins over the verbosity flags when set.
pub fn init_tracing(format: LogFormat, quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(quiet, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) is not an error worth surfacing.
    let _ = match format {
        LogFormat::Compact => builder.with_target(false).compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
}
