//! # overmind-orchestrator
//!
//! Self-correcting orchestration engine for Overmind.
//!
//! This crate provides:
//! - Deadline-bounded phase execution with event, council and memory side effects
//! - Phase strategies for planning, design, execution and reflection
//! - The sequential self-correction driver with bounded retries
//! - An equivalent graph engine with a single conditional retry edge
//! - A process-wide service holding the shared collaborators

mod collaborators;
mod council;
mod driver;
pub mod graph;
mod runner;
mod service;
mod strategies;

pub use collaborators::AgentCouncil;
pub use council::{summarize, ContributionRecord, CouncilSession, SessionSummary};
pub use driver::{MissionReport, SelfCorrectionDriver};
pub use graph::{
    route_after_audit, GraphEngine, GraphNode, GraphOutcome, GraphRun, GraphState, GraphUpdate,
    Route, TimelineEntry,
};
pub use runner::{PhaseCall, PhaseRunner};
pub use service::OvermindService;
pub use strategies::{
    indicates_missing_credentials, standard_pipeline, DesignStrategy, ExecutionStrategy,
    PhaseOutcome, PhaseStrategy, PlanningStrategy, ReflectionStrategy, RetryReason,
    STALEMATE_INSTRUCTION,
};
