//! Logging setup for the command-line tool.
//!
//! Logs go to stderr so they never mix with documents written to stdout.

use tracing_subscriber::EnvFilter;

/// Environment variable read when `--log-level` is not given.
pub const LOG_ENV: &str = "YAMP_LOG";

const DEFAULT_LEVEL: &str = "warn";

fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    }
}

/// Install the global subscriber. `level` takes precedence over `YAMP_LOG`.
///
/// A subscriber that is already installed is left in place.
pub fn init_logging(level: Option<&str>) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(filter_for(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(Some("info"));
        init_logging(None);
    }
}
