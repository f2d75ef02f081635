//! # overmind-core
//!
//! Core types for the Overmind cognitive orchestration engine.
//!
//! A mission is driven through a bounded plan -> design -> execute -> reflect
//! cycle by four pluggable agents. This crate owns the vocabulary every other
//! crate shares:
//!
//! - [`CognitiveState`] and [`CognitiveCritique`], the per-run progress record
//! - [`CognitivePhase`], the phase state machine
//! - [`CollaborationContext`], the per-run scratchpad and coordination trace
//! - [`LoopPolicy`] and [`OvermindConfig`]
//! - [`OvermindError`], the error taxonomy

pub mod config;
mod context;
mod error;
pub mod fail_open;
mod types;

pub use config::{DeadlineConfig, LoopDefaults, OvermindConfig, PhaseDeadlines, RetrievalConfig};
pub use context::{CollaborationContext, FEEDBACK_KEY, STRATEGY_OVERRIDE_KEY};
pub use error::{OvermindError, Result};
pub use types::*;
