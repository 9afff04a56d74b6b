//! Logging configuration for the exporter binary.

use tracing::{level_filters::LevelFilter, Subscriber};

use std::io;

/// Logger configuration. Passed explicitly to [`Self::subscriber()`] rather than read from globals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Enables `DEBUG` logs. Otherwise, logs are emitted at `INFO` level and above.
    pub debug: bool,
    /// Enables ANSI colors in the output.
    pub ansi: bool,
}

impl LogConfig {
    /// Returns the maximum enabled log level.
    pub fn max_level(self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    /// Builds a subscriber writing logs with full timestamps to stderr. Stdout is reserved
    /// for the bound server address.
    pub fn subscriber(self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_max_level(self.max_level())
            .with_ansi(self.ansi)
            .with_target(false)
            .with_writer(io::stderr)
            .finish()
    }
}
