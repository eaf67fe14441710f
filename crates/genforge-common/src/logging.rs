//! Logging bootstrap for genforge
//!
//! Library crates only emit `tracing` events. Binaries and test harnesses call
//! [`init_logging`] once to install a subscriber; `RUST_LOG` overrides the
//! configured level when set.

use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default level directive, e.g. "info" or "genforge_files=debug"
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include event targets in the output
    pub with_target: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: false,
        }
    }
}

impl LogOptions {
    /// Options with the given level and default format
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which makes the
/// call safe to repeat from tests.
pub fn init_logging(options: &LogOptions) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(options.filter())
        .with_target(options.with_target);

    let result = match options.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = LogOptions::default();
        assert_eq!(options.level, "info");
        assert_eq!(options.format, LogFormat::Pretty);
    }

    #[test]
    fn test_init_is_repeatable() {
        let options = LogOptions::with_level("debug");
        init_logging(&options);
        // Second install must not panic
        assert!(!init_logging(&options));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let options = LogOptions::with_level("not a [valid directive");
        // Building the filter must not panic
        let _ = options.filter();
    }
}
