//! Engine configuration
//!
//! Loaded through the `config` crate. Precedence: defaults (lowest), optional
//! TOML file, then `SWITCHBOARD__*` environment variables (highest).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::agent::DEFAULT_MODEL;
use crate::error::SwitchboardError;
use crate::logging::LoggingConfig;

/// Engine and loader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding agent descriptors
    pub agents_dir: PathBuf,
    /// Directory holding prompt descriptors
    pub prompts_dir: PathBuf,
    /// File suffix of agent descriptors
    pub agent_suffix: String,
    /// File suffix of prompt descriptors
    pub prompt_suffix: String,
    /// Prefix of participant ids exposed to the host
    pub participant_namespace: String,
    /// Model hint for descriptors that omit `model`
    pub default_model: String,
    /// Maximum alias references allowed in one frontmatter block
    pub max_aliases: usize,
    /// Maximum automatic handoff depth
    pub max_depth: usize,
    /// Prior turns kept when projecting history
    pub max_history_turns: usize,
    /// Fraction of the model's input capacity a turn may use
    pub admission_ratio: f64,
    /// Utilization above which a capacity warning is emitted
    pub warning_ratio: f64,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agents_dir: PathBuf::from(".github/agents"),
            prompts_dir: PathBuf::from(".github/prompts"),
            agent_suffix: ".agent.md".into(),
            prompt_suffix: ".prompt.md".into(),
            participant_namespace: "switchboard".into(),
            default_model: DEFAULT_MODEL.into(),
            max_aliases: 10,
            max_depth: 5,
            max_history_turns: 20,
            admission_ratio: 0.85,
            warning_ratio: 0.80,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional file plus the environment overlay
    pub fn load(path: Option<&Path>) -> Result<Self, SwitchboardError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        let builder = builder.add_source(
            Environment::with_prefix("SWITCHBOARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<(), SwitchboardError> {
        if self.max_depth == 0 {
            return Err(SwitchboardError::ConfigError(
                "max_depth must be at least 1".into(),
            ));
        }
        for (name, ratio) in [
            ("admission_ratio", self.admission_ratio),
            ("warning_ratio", self.warning_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(SwitchboardError::ConfigError(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.agent_suffix.is_empty() || self.prompt_suffix.is_empty() {
            return Err(SwitchboardError::ConfigError(
                "descriptor suffixes cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Participant id the host sees for a descriptor id
    pub fn participant_id(&self, descriptor_id: &str) -> String {
        format!("{}.{}", self.participant_namespace, descriptor_id)
    }

    /// Descriptor id for a participant id, stripping the namespace if present
    pub fn descriptor_id<'a>(&self, participant_id: &'a str) -> &'a str {
        participant_id
            .strip_prefix(self.participant_namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(participant_id)
    }
}
