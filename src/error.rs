//! Switchboard error types

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning a descriptor resource into an [`AgentDescriptor`].
///
/// None of these abort a directory load; the offending file is skipped.
///
/// [`AgentDescriptor`]: crate::agent::AgentDescriptor
#[derive(Debug, Error)]
pub enum LoadError {
    /// The frontmatter block is missing or is not a YAML mapping
    #[error("Invalid frontmatter in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A required field is absent or has the wrong type
    #[error("Missing or invalid '{field}' field in {}: {reason}", path.display())]
    Validation {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    /// The file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classified failures reported by the external model gateway
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum GatewayError {
    /// Requested model is unavailable
    #[error("model not found")]
    NotFound,

    /// Caller may not use the model
    #[error("no permission")]
    NoPermission,

    /// Request was refused by content filtering
    #[error("content blocked")]
    ContentBlocked,

    /// Quota or rate limit hit
    #[error("rate limited")]
    RateLimited,

    /// Anything else, with the vendor code when one was supplied
    #[error("unknown model error ({})", .0.as_deref().unwrap_or("no code"))]
    Unknown(Option<String>),
}

impl GatewayError {
    /// Classify a vendor error code. Matching ignores case.
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "off_topic" | "content_filter" | "content_filter_blocked" | "blocked" => {
                Self::ContentBlocked
            }
            "no_permissions" | "forbidden" => Self::NoPermission,
            "quota_exceeded" | "rate_limited" | "rate_limit_exceeded" => Self::RateLimited,
            "model_not_found" | "not_found" => Self::NotFound,
            "" => Self::Unknown(None),
            _ => Self::Unknown(Some(normalized)),
        }
    }

    /// Stable message shown to the end user
    pub fn user_message(&self) -> String {
        match self {
            Self::ContentBlocked => {
                "Request was blocked by content filters. Please try rephrasing your prompt.".into()
            }
            Self::NoPermission => "You do not have permission to use this language model. \
                 Please check your model access settings."
                .into(),
            Self::RateLimited => {
                "Request exceeded usage limits. Please wait a moment and try again.".into()
            }
            Self::NotFound => "The requested language model is unavailable. \
                 Please ensure the model provider is installed and active."
                .into(),
            Self::Unknown(Some(code)) => format!("Language model error ({}). Please try again.", code),
            Self::Unknown(None) => {
                "A language model error occurred. Please try again shortly.".into()
            }
        }
    }
}

/// Why a single turn stopped early.
///
/// Always contained at the turn boundary and surfaced as a notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// Estimated input cost is above the admission threshold
    #[error("request too large: estimated {estimated} tokens, maximum {allowed}")]
    CapacityExceeded { estimated: usize, allowed: usize },

    /// Gateway failure
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

/// Top-level errors for configuration and startup
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Descriptor loading error
    #[error("Load error: {0}")]
    LoadError(#[from] LoadError),

    /// No participant registered under this id
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// Logging setup error
    #[error("Logging error: {0}")]
    LoggingError(String),
}

impl From<config::ConfigError> for SwitchboardError {
    fn from(e: config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}
