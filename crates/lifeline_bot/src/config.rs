//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Bundled defaults (`lifeline.toml` shipped with this crate)
//! 2. `~/.config/lifeline/lifeline.toml` (optional)
//! 3. The file passed on the command line, or `./lifeline.toml` (optional)
//! 4. `LIFELINE_*` environment variables, `__` separating sections

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use lifeline_error::{ConfigError, LifelineResult};
use lifeline_security::OperatingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../lifeline.toml");

/// Complete Lifeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifelineConfig {
    /// Authorization settings
    pub security: SecurityConfig,
    /// Sandbox settings
    pub sandbox: SandboxConfig,
    /// Service control settings
    pub services: ServicesConfig,
    /// Reply handling
    pub replies: RepliesConfig,
    /// Process logging
    pub logging: LoggingConfig,
}

/// `[security]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Principals allowed to use the bot
    pub allowed_principals: Vec<i64>,
    /// Calls accepted per window
    pub rate_limit: u32,
    /// Rate-limit window in seconds
    pub rate_window_secs: u64,
    /// Confirmation token lifetime in seconds
    pub confirm_ttl_secs: u64,
    /// Mode at startup
    pub default_mode: OperatingMode,
    /// Seconds between token sweeps
    pub sweep_interval_secs: u64,
    /// Audit file; defaults to `audit.log` under the sandbox root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_path: Option<PathBuf>,
}

/// `[sandbox]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directory every file action is confined to
    pub root: PathBuf,
    /// Largest file accepted or sent, in MiB
    pub max_file_mb: u64,
}

/// `[services]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Services that may be inspected or restarted
    pub allowed: Vec<String>,
    /// Deadline for each host process, in seconds
    pub command_timeout_secs: u64,
}

/// `[replies]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepliesConfig {
    /// Seconds before sensitive replies are deleted
    pub sensitive_ttl_secs: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl LifelineConfig {
    /// Load with full precedence: defaults, home config, `path` (or
    /// `./lifeline.toml`), then environment.
    ///
    /// An explicit `path` must exist.
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be parsed or validation fails.
    #[instrument]
    pub fn load(path: Option<&Path>) -> LifelineResult<Self> {
        debug!("Loading configuration");

        let mut builder = defaults();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/lifeline/lifeline.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("lifeline").required(false)),
        };

        builder = builder.add_source(environment());
        finish(builder)
    }

    /// Load from defaults overlaid with a TOML document. Ignores the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be parsed or validation fails.
    pub fn from_toml_str(toml: &str) -> LifelineResult<Self> {
        finish(defaults().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// Check cross-field constraints not expressible in the types.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.allowed_principals.is_empty() {
            return Err(ConfigError::new(
                "security.allowed_principals must list at least one principal",
            ));
        }
        if self.security.rate_limit == 0 {
            return Err(ConfigError::new("security.rate_limit must be greater than zero"));
        }
        if self.security.rate_window_secs == 0 {
            return Err(ConfigError::new(
                "security.rate_window_secs must be greater than zero",
            ));
        }
        if self.security.confirm_ttl_secs == 0 {
            return Err(ConfigError::new(
                "security.confirm_ttl_secs must be greater than zero",
            ));
        }
        if self.security.sweep_interval_secs == 0 {
            return Err(ConfigError::new(
                "security.sweep_interval_secs must be greater than zero",
            ));
        }
        if self.sandbox.root.as_os_str().is_empty() {
            return Err(ConfigError::new("sandbox.root is required"));
        }
        if self.sandbox.max_file_mb == 0 {
            return Err(ConfigError::new("sandbox.max_file_mb must be greater than zero"));
        }
        if self.services.command_timeout_secs == 0 {
            return Err(ConfigError::new(
                "services.command_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Rate-limit window.
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.security.rate_window_secs)
    }

    /// Confirmation token lifetime.
    pub fn confirm_ttl(&self) -> Duration {
        Duration::from_secs(self.security.confirm_ttl_secs)
    }

    /// Interval between token sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.security.sweep_interval_secs)
    }

    /// Audit file location.
    pub fn audit_path(&self) -> PathBuf {
        self.security
            .audit_path
            .clone()
            .unwrap_or_else(|| self.sandbox.root.join("audit.log"))
    }

    /// File size cap in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.sandbox.max_file_mb.saturating_mul(1024 * 1024)
    }

    /// Deadline for host processes.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.services.command_timeout_secs)
    }

    /// Lifetime of sensitive replies.
    pub fn sensitive_ttl(&self) -> Duration {
        Duration::from_secs(self.replies.sensitive_ttl_secs)
    }
}

fn defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn environment() -> Environment {
    Environment::with_prefix("LIFELINE")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("security.allowed_principals")
        .with_list_parse_key("services.allowed")
        .try_parsing(true)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> LifelineResult<LifelineConfig> {
    let config: LifelineConfig = builder
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;

    config.validate()?;
    Ok(config)
}
