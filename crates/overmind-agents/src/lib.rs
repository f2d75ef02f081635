//! # overmind-agents
//!
//! Collaborator contracts for the Overmind orchestration engine.
//!
//! The engine never reasons about plans itself. It drives four agents
//! through traits defined here:
//!
//! - [`Planner`] produces plans
//! - [`Architect`] turns plans into designs
//! - [`Executor`] carries designs out
//! - [`Reflector`] reviews plans and results and guards against stalemates
//!
//! plus the supporting services: [`EventSink`], [`MemoryAgent`],
//! [`ObjectiveRefiner`] and [`SnippetRetriever`].

mod events;
pub mod fingerprint;
mod knowledge;
mod memory;
mod traits;
mod types;

pub use events::{AgentEvent, BroadcastEventSink, BufferedEventSink, EventSink, TracingEventSink};
pub use fingerprint::{detect_stalemate, plan_fingerprint, STALEMATE_REPEAT_THRESHOLD};
pub use knowledge::{
    EmptyRetriever, ObjectiveRefiner, PassthroughRefiner, RefinedObjective, Snippet,
    SnippetRetriever,
};
pub use memory::{InMemoryStore, MemoryAgent, MemorySnapshot, NoopMemory};
pub use traits::{Architect, Executor, Planner, Reflector};
pub use types::AgentRole;
