//! Logging System
//!
//! Structured logging on top of `tracing`. The library only emits events;
//! binaries call [`init_logging`] once to install a subscriber.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::SwitchboardError;

/// Environment variable that overrides the configured filter
pub const LOG_ENV: &str = "SWITCHBOARD_LOG";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber. Output goes to stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SwitchboardError> {
    if !config.enabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(|e| SwitchboardError::LoggingError(e.to_string()));
    }

    let filter = build_env_filter(config)?;
    let base = Registry::default().with(filter);

    match config.format.as_str() {
        "json" => base
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        "text" => base
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        other => {
            return Err(SwitchboardError::LoggingError(format!(
                "Unknown log format '{}', expected text or json",
                other
            )))
        }
    }
    .map_err(|e| SwitchboardError::LoggingError(e.to_string()))
}

/// Build the filter from `SWITCHBOARD_LOG` or the config
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, SwitchboardError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| SwitchboardError::LoggingError(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.modules {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse().map_err(|e| {
            SwitchboardError::LoggingError(format!("Invalid directive '{}': {}", directive, e))
        })?);
    }

    Ok(filter)
}
