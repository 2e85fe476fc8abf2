//! # Switchboard
//!
//! Configuration-driven handoff orchestration for chat agents.
//!
//! Agents and reusable prompts are declared as markdown files with a YAML
//! frontmatter block. Each one becomes a chat participant. A participant may
//! declare handoffs to others; automatic handoffs are followed depth-first
//! after its own answer, with cycle and depth guards, and manual ones are
//! offered to the user as actions.
//!
//! ## Architecture
//!
//! ```text
//!   .github/agents/*.agent.md     .github/prompts/*.prompt.md
//!                │                           │
//!                └─────────┬─────────────────┘
//!                          ▼
//!                 ┌──────────────────┐
//!                 │ DescriptorLoader │  frontmatter → AgentDescriptor
//!                 └────────┬─────────┘
//!                          ▼
//!                 ┌──────────────────┐   reload: copy-and-swap
//!                 │  RegistryHandle  │◄───────────────────────
//!                 └────────┬─────────┘
//!                          │ snapshot per request
//!                          ▼
//!   host ──► Participant ──► OrchestrationEngine ──► ModelGateway
//!                │                   │                   │
//!                │                   │ handoff worklist  │ fragments
//!                │                   ▼                   ▼
//!                └──────────────► OutputPort ◄───────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Descriptor**: An agent or prompt loaded from a markdown file
//! - **Handoff**: A declared edge to another descriptor, automatic or manual
//! - **Dispatch**: One top-level request plus every automatic handoff it triggers
//! - **Notice**: An inline, user-facing report of a contained failure

pub mod agent;
pub mod budget;
pub mod channel;
pub mod config;
pub mod error;
pub mod followup;
pub mod gateway;
pub mod hierarchy;
pub mod history;
pub mod loader;
pub mod logging;
pub mod notice;
pub mod orchestrator;
pub mod participant;
pub mod registry;
pub mod session;

pub use agent::{AgentDescriptor, DescriptorKind, Handoff};
pub use budget::{BudgetAssessment, BudgetPolicy};
pub use channel::{ChannelPort, OutputPort, PortEvent, SuggestedAction};
pub use config::EngineConfig;
pub use error::{GatewayError, LoadError, SwitchboardError, TurnError};
pub use followup::Followup;
pub use gateway::{ChatMessage, FragmentStream, ModelGateway, Role};
pub use hierarchy::{HandoffEdge, HandoffGraph};
pub use history::{HostTurn, ResponsePart};
pub use loader::DescriptorLoader;
pub use logging::{init_logging, LoggingConfig};
pub use notice::Notice;
pub use orchestrator::{DispatchReport, Invocation, OrchestrationEngine, Selection, TurnRequest};
pub use participant::{Participant, Switchboard};
pub use registry::{AgentRegistry, RegistryHandle};
pub use session::{CancelSignal, DispatchContext};
