//! Logging setup.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingFormat {
    #[default]
    Text,
    Json,
}

/// Installs a global subscriber filtered by `RUST_LOG`, falling back to
/// `default_level`. Does nothing if a subscriber is already installed.
pub fn init(default_level: &str, format: LoggingFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LoggingFormat::Text => builder.try_init(),
        LoggingFormat::Json => builder.json().try_init(),
    };
}

/// Subscriber for tests, writing through the test harness so output is
/// captured per test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init("info", LoggingFormat::Json);
        init("debug", LoggingFormat::Text);
        init_test();
    }
}
