//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How process logs are filtered and formatted.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
}

impl LoggingOptions {
    /// Options with the given default filter.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            json: false,
        }
    }

    /// Raise the default filter to `debug`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Enable JSON-formatted logs.
    pub fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// Filter honouring `RUST_LOG` first, then the configured level.
    pub fn filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error>> {
        Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&self.level))?)
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for replies.
pub fn init_logging(options: &LoggingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = options.filter()?;

    let fmt_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
