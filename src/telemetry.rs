//! Tracing subscriber setup for the `treemerge` binary.
//!
//! Diagnostics go to stderr so stdout stays clean for reports. The filter
//! comes from `TREEMERGE_LOG` (standard `EnvFilter` directives) and
//! defaults to `warn`.
//!
//! ```bash
//! TREEMERGE_LOG=treemerge_core=debug treemerge merge --repo r.json --baseline a --other b
//! TREEMERGE_LOG_FORMAT=json treemerge merge ...
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Environment variable holding the filter directives.
pub const FILTER_ENV: &str = "TREEMERGE_LOG";

/// Environment variable selecting the log line format (`json` or `pretty`).
pub const FORMAT_ENV: &str = "TREEMERGE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn";

/// Shape of the log lines written to stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, with span-close timings.
    Json,
}

impl LogFormat {
    /// Read the format from [`FORMAT_ENV`]. Anything but `json` is pretty.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Build the filter from [`FILTER_ENV`], falling back to `warn` when the
/// variable is unset or unparsable.
#[must_use]
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Call once, early in `main`.
///
/// A second call (e.g. from a test harness that already installed one) is
/// ignored.
pub fn init(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter());
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Pretty);
        init(LogFormat::Json);
    }
}
