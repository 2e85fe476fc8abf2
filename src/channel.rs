//! Output ports - how a dispatch streams back to the host

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::followup::Followup;

/// A handoff the user may trigger manually
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    /// Target descriptor id
    pub target: String,
    /// Button title
    pub title: String,
    /// Chat text that addresses the target
    pub prompt: String,
}

/// Streaming sink supplied by the host for one request.
///
/// The engine never buffers a response; every fragment is forwarded here as
/// soon as the gateway yields it.
pub trait OutputPort: Send {
    /// Transient status, e.g. "X is analyzing..."
    fn emit_progress(&mut self, message: &str);

    /// Markdown text appended to the response
    fn emit_text(&mut self, text: &str);

    /// A suggested handoff button
    fn emit_action(&mut self, action: &SuggestedAction);

    /// A follow-up prompt the user may pick next
    fn emit_choice(&mut self, choice: &Followup);
}

/// Everything a port can receive, as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PortEvent {
    Progress { message: String },
    Text { text: String },
    Action { action: SuggestedAction },
    Choice { choice: Followup },
}

/// Records events in memory
impl OutputPort for Vec<PortEvent> {
    fn emit_progress(&mut self, message: &str) {
        self.push(PortEvent::Progress {
            message: message.to_string(),
        });
    }

    fn emit_text(&mut self, text: &str) {
        self.push(PortEvent::Text {
            text: text.to_string(),
        });
    }

    fn emit_action(&mut self, action: &SuggestedAction) {
        self.push(PortEvent::Action {
            action: action.clone(),
        });
    }

    fn emit_choice(&mut self, choice: &Followup) {
        self.push(PortEvent::Choice {
            choice: choice.clone(),
        });
    }
}

/// Concatenated text of every `Text` event
pub fn collect_text(events: &[PortEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            PortEvent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Port that forwards events over an unbounded channel
#[derive(Clone)]
pub struct ChannelPort {
    event_tx: mpsc::UnboundedSender<PortEvent>,
}

impl ChannelPort {
    /// Create a port and the receiver the host reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PortEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    fn send(&self, event: PortEvent) {
        // A closed receiver means the host stopped listening; output is dropped.
        let _ = self.event_tx.send(event);
    }
}

impl OutputPort for ChannelPort {
    fn emit_progress(&mut self, message: &str) {
        self.send(PortEvent::Progress {
            message: message.to_string(),
        });
    }

    fn emit_text(&mut self, text: &str) {
        self.send(PortEvent::Text {
            text: text.to_string(),
        });
    }

    fn emit_action(&mut self, action: &SuggestedAction) {
        self.send(PortEvent::Action {
            action: action.clone(),
        });
    }

    fn emit_choice(&mut self, choice: &Followup) {
        self.send(PortEvent::Choice {
            choice: choice.clone(),
        });
    }
}
