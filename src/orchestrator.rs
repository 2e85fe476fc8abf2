//! Orchestration engine - runs a turn and expands its automatic handoffs
//!
//! Handoff expansion walks the agent graph depth-first with an explicit
//! worklist instead of native recursion. Each work item carries its own
//! [`DispatchContext`], so the per-path visited set and depth counter behave
//! exactly as they would on a call stack: a handoff's whole subtree finishes
//! before the next sibling handoff is looked at.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::agent::{AgentDescriptor, Handoff, CONTINUATION_PROMPT};
use crate::budget::BudgetPolicy;
use crate::channel::{OutputPort, SuggestedAction};
use crate::config::EngineConfig;
use crate::error::TurnError;
use crate::gateway::{ChatMessage, ModelGateway};
use crate::history::{self, HostTurn};
use crate::notice::Notice;
use crate::registry::AgentRegistry;
use crate::session::{CancelSignal, DispatchContext};

/// Editor text the user had selected when sending the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    /// Language tag for the fenced block, e.g. `rust`
    pub language_id: String,
}

/// The user's request as delivered by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnRequest {
    pub prompt: String,
    /// Slash command, if the user invoked one
    pub command: Option<String>,
    pub selection: Option<Selection>,
    /// Environment line for the system prompt, e.g. the workspace path
    pub environment: Option<String>,
}

impl TurnRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Everything a dispatch borrows from the host for one request
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub request: &'a TurnRequest,
    pub history: &'a [HostTurn],
    pub gateway: &'a dyn ModelGateway,
    pub cancel: &'a CancelSignal,
}

/// What happened during one top-level dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub request_id: Uuid,
    /// Calls made to the model gateway
    pub model_invocations: usize,
    /// Turns run through automatic handoffs
    pub sub_turns: usize,
    /// Greatest depth reached
    pub deepest: usize,
    /// Notices in emission order
    pub notices: Vec<Notice>,
    /// Manual handoffs surfaced as actions
    pub suggested: Vec<SuggestedAction>,
    pub cancelled: bool,
}

impl DispatchReport {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            model_invocations: 0,
            sub_turns: 0,
            deepest: 0,
            notices: Vec::new(),
            suggested: Vec::new(),
            cancelled: false,
        }
    }

    /// Number of notices matching `predicate`
    pub fn count_notices(&self, predicate: impl Fn(&Notice) -> bool) -> usize {
        self.notices.iter().filter(|n| predicate(n)).count()
    }
}

enum Work {
    Turn {
        descriptor: Arc<AgentDescriptor>,
        ctx: DispatchContext,
        prompt: String,
        command: Option<String>,
    },
    Handoff {
        handoff: Handoff,
        parent: DispatchContext,
        parent_prompt: String,
    },
}

/// Runs turns against a registry snapshot.
///
/// Holds no per-request state; one engine serves any number of concurrent
/// requests.
#[derive(Debug, Clone)]
pub struct OrchestrationEngine {
    max_depth: usize,
    max_history_turns: usize,
    budget: BudgetPolicy,
}

impl OrchestrationEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_history_turns: config.max_history_turns,
            budget: BudgetPolicy {
                admission_ratio: config.admission_ratio,
                warning_ratio: config.warning_ratio,
            },
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Messages for one turn: projected history, system block, prompt, selection
    pub fn assemble_messages(
        &self,
        descriptor: &AgentDescriptor,
        prompt: &str,
        request: &TurnRequest,
        history: &[HostTurn],
    ) -> Vec<ChatMessage> {
        let mut messages = history::project(history, self.max_history_turns);
        messages.push(ChatMessage::user(
            descriptor.system_prompt(request.environment.as_deref()),
        ));
        messages.push(ChatMessage::user(prompt));

        if let Some(selection) = request.selection.as_ref().filter(|s| !s.text.is_empty()) {
            messages.push(ChatMessage::user(format!(
                "Here is the selected code:\n```{}\n{}\n```",
                selection.language_id, selection.text
            )));
        }

        messages
    }

    /// Run `descriptor` for a request and expand its handoffs.
    ///
    /// Never fails: turn-level errors become notices in the stream and in the
    /// returned report.
    #[instrument(
        skip_all,
        fields(request_id = %ctx.request_id, participant = %ctx.participant_id)
    )]
    pub async fn dispatch(
        &self,
        registry: &AgentRegistry,
        descriptor: Arc<AgentDescriptor>,
        ctx: DispatchContext,
        invocation: Invocation<'_>,
        port: &mut dyn OutputPort,
    ) -> DispatchReport {
        let mut report = DispatchReport::new(ctx.request_id);
        let mut work = vec![Work::Turn {
            descriptor,
            prompt: invocation.request.prompt.clone(),
            command: invocation.request.command.clone(),
            ctx,
        }];

        while let Some(item) = work.pop() {
            if invocation.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match item {
                Work::Turn {
                    descriptor,
                    ctx,
                    prompt,
                    command,
                } => {
                    if ctx.depth > 0 {
                        report.sub_turns += 1;
                    }
                    report.deepest = report.deepest.max(ctx.depth);
                    debug!(agent = %descriptor.id, depth = ctx.depth, "Running turn");

                    let outcome = self
                        .run_turn(&descriptor, &prompt, command.as_deref(), invocation, port, &mut report)
                        .await;

                    match outcome {
                        Ok(()) => {}
                        Err(TurnError::Cancelled) => {
                            info!(agent = %descriptor.id, "Dispatch cancelled");
                            report.cancelled = true;
                            break;
                        }
                        Err(TurnError::CapacityExceeded { estimated, allowed }) => {
                            warn!(agent = %descriptor.id, estimated, allowed, "Turn refused: over budget");
                            emit_notice(port, &mut report, Notice::CapacityExceeded { estimated, allowed });
                            continue;
                        }
                        Err(TurnError::Gateway(e)) => {
                            error!(
                                agent = %descriptor.name,
                                participant = %ctx.participant_id,
                                error = ?e,
                                "Turn failed"
                            );
                            emit_notice(
                                port,
                                &mut report,
                                Notice::GatewayFailure {
                                    agent: descriptor.name.clone(),
                                    error: e,
                                },
                            );
                            continue;
                        }
                    }

                    if descriptor.handoffs.is_empty() {
                        continue;
                    }
                    if ctx.depth >= self.max_depth {
                        emit_notice(port, &mut report, Notice::MaxDepthReached { depth: ctx.depth });
                        continue;
                    }

                    port.emit_text("\n\n---\n\n");
                    port.emit_text("**Additional Analysis from Specialized Agents:**\n\n");

                    // Reversed so the first declared handoff is popped first.
                    for handoff in descriptor.handoffs.iter().rev() {
                        work.push(Work::Handoff {
                            handoff: handoff.clone(),
                            parent: ctx.clone(),
                            parent_prompt: prompt.clone(),
                        });
                    }
                }
                Work::Handoff {
                    handoff,
                    parent,
                    parent_prompt,
                } => {
                    if !handoff.auto_send {
                        let action = SuggestedAction {
                            target: handoff.target.clone(),
                            title: handoff.title(),
                            prompt: handoff.mention(),
                        };
                        port.emit_action(&action);
                        report.suggested.push(action);
                        continue;
                    }

                    if parent.on_path(&handoff.target) {
                        debug!(target = %handoff.target, "Cycle avoided");
                        emit_notice(
                            port,
                            &mut report,
                            Notice::CycleAvoided {
                                target: handoff.target.clone(),
                            },
                        );
                        continue;
                    }

                    port.emit_text(&format!("\n\n### {}\n\n", handoff.heading()));

                    match registry.resolve(&handoff.target) {
                        Some(target) => {
                            let prompt = handoff
                                .prompt
                                .clone()
                                .or_else(|| Some(parent_prompt).filter(|p| !p.trim().is_empty()))
                                .unwrap_or_else(|| CONTINUATION_PROMPT.to_string());
                            work.push(Work::Turn {
                                descriptor: Arc::clone(target),
                                ctx: parent.child(handoff.target.clone()),
                                prompt,
                                command: None,
                            });
                        }
                        None => {
                            warn!(target = %handoff.target, "Handoff target not found");
                            emit_notice(
                                port,
                                &mut report,
                                Notice::HandoffNotFound {
                                    target: handoff.target.clone(),
                                },
                            );
                        }
                    }
                }
            }
        }

        info!(
            invocations = report.model_invocations,
            sub_turns = report.sub_turns,
            notices = report.notices.len(),
            cancelled = report.cancelled,
            "Dispatch finished"
        );
        report
    }

    /// One model call, streamed straight to the port
    async fn run_turn(
        &self,
        descriptor: &AgentDescriptor,
        prompt: &str,
        command: Option<&str>,
        invocation: Invocation<'_>,
        port: &mut dyn OutputPort,
        report: &mut DispatchReport,
    ) -> Result<(), TurnError> {
        port.emit_progress(&format!("{} is analyzing...", descriptor.name));

        if let Some(command) = command {
            port.emit_text(&format!(
                "*Running {} with command: {}*\n\n",
                descriptor.name, command
            ));
        }

        let messages =
            self.assemble_messages(descriptor, prompt, invocation.request, invocation.history);

        let gateway = invocation.gateway;
        let assessment = self.budget.assess(&messages, gateway.max_input_tokens());
        if self.budget.should_warn(&assessment) {
            emit_notice(
                port,
                report,
                Notice::CapacityWarning {
                    utilization: assessment.utilization.round() as u32,
                },
            );
        }
        if !assessment.admitted() {
            return Err(TurnError::CapacityExceeded {
                estimated: assessment.estimated,
                allowed: assessment.allowed,
            });
        }

        let cancel = invocation.cancel;
        if cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }

        debug!(
            model = gateway.model_id(),
            messages = messages.len(),
            estimated = assessment.estimated,
            "Sending request"
        );
        report.model_invocations += 1;

        let mut fragments = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TurnError::Cancelled),
            response = gateway.send_request(messages, cancel) => response?,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TurnError::Cancelled),
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => port.emit_text(&fragment),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }
    }
}

impl Default for OrchestrationEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn emit_notice(port: &mut dyn OutputPort, report: &mut DispatchReport, notice: Notice) {
    port.emit_text(&notice.to_string());
    report.notices.push(notice);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Role;
    use crate::history::ResponsePart;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor {
            id: "reviewer".into(),
            name: "Reviewer".into(),
            description: "Reviews code".into(),
            tools: BTreeSet::new(),
            model_hint: "m".into(),
            handoffs: vec![],
            instructions: "Be thorough.".into(),
            source_path: PathBuf::new(),
        }
    }

    #[test]
    fn test_assemble_without_history() {
        let engine = OrchestrationEngine::default();
        let request = TurnRequest::new("Check this");
        let messages = engine.assemble_messages(&descriptor(), "Check this", &request, &[]);

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.role == Role::User));
        assert!(messages[0].content.starts_with("You are Reviewer"));
        assert_eq!(messages[1].content, "Check this");
    }

    #[test]
    fn test_assemble_with_history_and_selection() {
        let engine = OrchestrationEngine::default();
        let request = TurnRequest {
            prompt: "Why?".into(),
            selection: Some(Selection {
                text: "fn main() {}".into(),
                language_id: "rust".into(),
            }),
            environment: Some("Current workspace: /repo".into()),
            ..Default::default()
        };
        let history = vec![
            HostTurn::request("Earlier"),
            HostTurn::response(vec![ResponsePart::markdown("Answer")]),
        ];

        let messages = engine.assemble_messages(&descriptor(), "Why?", &request, &history);

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], ChatMessage::user("Earlier"));
        assert_eq!(messages[1], ChatMessage::assistant("Answer"));
        assert!(messages[2].content.contains("Current workspace: /repo"));
        assert_eq!(messages[3].content, "Why?");
        assert_eq!(
            messages[4].content,
            "Here is the selected code:\n```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn test_empty_selection_is_skipped() {
        let engine = OrchestrationEngine::default();
        let request = TurnRequest {
            prompt: "x".into(),
            selection: Some(Selection {
                text: String::new(),
                language_id: "rust".into(),
            }),
            ..Default::default()
        };
        assert_eq!(engine.assemble_messages(&descriptor(), "x", &request, &[]).len(), 2);
    }

    #[test]
    fn test_history_limit_from_config() {
        let engine = OrchestrationEngine::new(&EngineConfig {
            max_history_turns: 2,
            ..Default::default()
        });
        let history: Vec<_> = (0..6).map(|i| HostTurn::request(i.to_string())).collect();
        let messages = engine.assemble_messages(&descriptor(), "now", &TurnRequest::new("now"), &history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "4");
    }
}
