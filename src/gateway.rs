//! External model gateway contract

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::session::CancelSignal;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lazy, non-restartable sequence of response text fragments
pub type FragmentStream = BoxStream<'static, Result<String, GatewayError>>;

/// The generative model, as seen by the engine.
///
/// One gateway is bound per top-level request and shared by every sub-turn
/// of that request.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model identifier, for logs
    fn model_id(&self) -> &str;

    /// Maximum input tokens the model accepts
    fn max_input_tokens(&self) -> usize;

    /// Start a request. Fragments are pulled lazily from the returned stream.
    async fn send_request(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancelSignal,
    ) -> Result<FragmentStream, GatewayError>;
}
