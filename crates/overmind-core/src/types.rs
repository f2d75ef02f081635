//! Core type definitions for Overmind orchestration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{OvermindError, Result};

/// Mission identifier (opaque to the engine)
pub type MissionId = String;

/// A unit of orchestrated work. Only the id and objective cross into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub objective: String,
}

impl Mission {
    /// Create a mission with a fresh random id
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            objective: objective.into(),
        }
    }

    /// Create a mission with a caller-supplied id
    pub fn with_id(id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
        }
    }
}

/// Cognitive phases a mission moves through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CognitivePhase {
    #[default]
    Planning,
    ReviewPlan,
    Design,
    Execution,
    Reflection,
    RePlanning,
}

impl CognitivePhase {
    /// Whether moving from `self` to `next` is a legal step of the cycle
    ///
    /// ```text
    /// PLANNING -> REVIEW_PLAN -> DESIGN -> EXECUTION -> REFLECTION
    ///     ^            |                                    |
    ///     |            v                                    |
    ///     +------ RE_PLANNING <-----------------------------+
    /// ```
    ///
    /// PLANNING may also go straight to RE_PLANNING when the planner stalls.
    pub fn can_transition_to(self, next: CognitivePhase) -> bool {
        use CognitivePhase::*;
        matches!(
            (self, next),
            (Planning, ReviewPlan)
                | (Planning, RePlanning)
                | (ReviewPlan, Design)
                | (ReviewPlan, RePlanning)
                | (Design, Execution)
                | (Execution, Reflection)
                | (Reflection, RePlanning)
                | (RePlanning, Planning)
        )
    }

    /// Stable lowercase label used in events and council records
    pub fn label(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::ReviewPlan => "review_plan",
            Self::Design => "design",
            Self::Execution => "execution",
            Self::Reflection => "reflection",
            Self::RePlanning => "re_planning",
        }
    }
}

impl std::fmt::Display for CognitivePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "PLANNING"),
            Self::ReviewPlan => write!(f, "REVIEW_PLAN"),
            Self::Design => write!(f, "DESIGN"),
            Self::Execution => write!(f, "EXECUTION"),
            Self::Reflection => write!(f, "REFLECTION"),
            Self::RePlanning => write!(f, "RE_PLANNING"),
        }
    }
}

impl std::str::FromStr for CognitivePhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PLANNING" => Ok(Self::Planning),
            "REVIEW_PLAN" => Ok(Self::ReviewPlan),
            "DESIGN" => Ok(Self::Design),
            "EXECUTION" => Ok(Self::Execution),
            "REFLECTION" => Ok(Self::Reflection),
            "RE_PLANNING" | "REPLANNING" => Ok(Self::RePlanning),
            _ => Err(format!("Invalid cognitive phase: {}", s)),
        }
    }
}

/// Approval decision produced by the reflector on plan review and final review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveCritique {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
    /// Confidence, expected in [0, 1]
    #[serde(default)]
    pub score: f64,
}

impl CognitiveCritique {
    pub fn approved(feedback: impl Into<String>, score: f64) -> Self {
        Self {
            approved: true,
            feedback: feedback.into(),
            score,
        }
    }

    pub fn rejected(feedback: impl Into<String>, score: f64) -> Self {
        Self {
            approved: false,
            feedback: feedback.into(),
            score,
        }
    }
}

/// Mission progress record, owned by a single run and never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveState {
    pub mission_id: MissionId,
    pub objective: String,
    pub plan: Option<Value>,
    pub design: Option<Value>,
    pub execution_result: Option<Value>,
    pub critique: Option<CognitiveCritique>,
    pub iteration_count: usize,
    pub max_iterations: usize,
    pub current_phase: CognitivePhase,
    /// Plan fingerprints in the order they were produced
    pub history_hashes: Vec<String>,
}

impl CognitiveState {
    pub fn new(mission: &Mission, max_iterations: usize) -> Self {
        Self {
            mission_id: mission.id.clone(),
            objective: mission.objective.clone(),
            plan: None,
            design: None,
            execution_result: None,
            critique: None,
            iteration_count: 0,
            max_iterations,
            current_phase: CognitivePhase::Planning,
            history_hashes: Vec::new(),
        }
    }

    /// Move to `next`, rejecting steps the cycle does not allow
    pub fn transition(&mut self, next: CognitivePhase) -> Result<()> {
        if self.current_phase == next {
            return Ok(());
        }
        if !self.current_phase.can_transition_to(next) {
            return Err(OvermindError::InvalidTransition {
                from: self.current_phase.to_string(),
                to: next.to_string(),
            });
        }
        self.current_phase = next;
        Ok(())
    }

    /// Re-enter planning for a new attempt, via RE_PLANNING when needed
    pub fn reenter_planning(&mut self) -> Result<()> {
        if self.current_phase != CognitivePhase::Planning {
            self.transition(CognitivePhase::RePlanning)?;
        }
        self.transition(CognitivePhase::Planning)
    }
}

/// Lower bound for the graph engine's iteration cap
pub const MIN_LOOP_ITERATIONS: usize = 1;
/// Upper bound for the graph engine's iteration cap, whatever the caller asks for
pub const MAX_LOOP_ITERATIONS: usize = 5;
pub const DEFAULT_MAX_ITERATIONS: usize = 2;
pub const DEFAULT_APPROVAL_SCORE: f64 = 0.75;

/// Parameters of the graph engine's retry branch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopPolicy {
    pub max_iterations: usize,
    pub approval_score: f64,
}

impl LoopPolicy {
    /// Build a policy, clamping `max_iterations` into [1, 5]
    pub fn new(max_iterations: usize, approval_score: f64) -> Self {
        Self {
            max_iterations: max_iterations.clamp(MIN_LOOP_ITERATIONS, MAX_LOOP_ITERATIONS),
            approval_score,
        }
    }

    /// Read `max_iterations` / `approval_score` from a caller context map,
    /// falling back to `defaults` for anything missing or malformed
    pub fn from_context(context: &Map<String, Value>, defaults: LoopPolicy) -> Self {
        let max_iterations = context
            .get("max_iterations")
            .and_then(value_as_usize)
            .unwrap_or(defaults.max_iterations);
        let approval_score = context
            .get("approval_score")
            .and_then(Value::as_f64)
            .unwrap_or(defaults.approval_score);
        Self::new(max_iterations, approval_score)
    }

    /// Whether an audit is good enough to stop looping
    pub fn accepts(&self, critique: &CognitiveCritique) -> bool {
        critique.approved && critique.score >= self.approval_score
    }
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS, DEFAULT_APPROVAL_SCORE)
    }
}

fn value_as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as usize)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
