//! Projection of host conversation history into model messages

use serde::{Deserialize, Serialize};

use crate::gateway::ChatMessage;

/// Stand-in for an assistant turn with no extractable text
pub const EMPTY_RESPONSE: &str = "[No text response]";

/// A part of a previous assistant response, as the host recorded it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    /// Rendered markdown text
    Markdown { value: String },
    /// A file tree widget
    FileTree,
    /// A reference link
    Anchor { title: Option<String> },
    /// An action button
    CommandButton { title: Option<String> },
    /// Transient progress message; carries no content
    Progress { message: String },
}

impl ResponsePart {
    pub fn markdown(value: impl Into<String>) -> Self {
        Self::Markdown {
            value: value.into(),
        }
    }

    /// Text this part contributes to the transcript
    fn render(&self) -> Option<String> {
        match self {
            Self::Markdown { value } => Some(value.clone()),
            Self::FileTree => Some("[File tree displayed]".into()),
            Self::Anchor { title } => Some(format!(
                "[Reference: {}]",
                title.as_deref().filter(|t| !t.is_empty()).unwrap_or("link")
            )),
            Self::CommandButton { title } => Some(format!(
                "[Button: {}]",
                title.as_deref().filter(|t| !t.is_empty()).unwrap_or("action")
            )),
            Self::Progress { .. } => None,
        }
    }
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum HostTurn {
    /// Something the user asked
    Request { prompt: String },
    /// What a participant answered
    Response { parts: Vec<ResponsePart> },
}

impl HostTurn {
    pub fn request(prompt: impl Into<String>) -> Self {
        Self::Request {
            prompt: prompt.into(),
        }
    }

    pub fn response(parts: Vec<ResponsePart>) -> Self {
        Self::Response { parts }
    }
}

/// Keep the most recent `max_turns` turns and map each to exactly one message
pub fn project(history: &[HostTurn], max_turns: usize) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(max_turns);
    history[start..]
        .iter()
        .map(|turn| match turn {
            HostTurn::Request { prompt } => ChatMessage::user(prompt.clone()),
            HostTurn::Response { parts } => {
                let content = parts
                    .iter()
                    .filter_map(ResponsePart::render)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                if content.is_empty() {
                    ChatMessage::assistant(EMPTY_RESPONSE)
                } else {
                    ChatMessage::assistant(content)
                }
            }
        })
        .collect()
}
