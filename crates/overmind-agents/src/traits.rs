//! Collaborator contracts consumed by the orchestration engine
//!
//! Each capability is its own trait so hosts can plug in any mix of
//! implementations. All collaborators may be shared across concurrently
//! running missions and must therefore be `Send + Sync`.

use async_trait::async_trait;
use overmind_core::{CognitiveCritique, CollaborationContext, Result};
use serde_json::Value;

use crate::fingerprint::{check_fingerprint, plan_fingerprint};

/// Produces plans from an objective
#[async_trait]
pub trait Planner: Send + Sync {
    /// Create a plan. Feedback from earlier attempts is visible in `context`.
    async fn create_plan(&self, objective: &str, context: &CollaborationContext) -> Result<Value>;

    /// Told when its last plan repeated itself too often
    async fn on_stalemate(&self, _instruction: &str) {}
}

/// Turns an approved plan into a design
#[async_trait]
pub trait Architect: Send + Sync {
    async fn design_solution(&self, plan: &Value, context: &CollaborationContext)
        -> Result<Value>;
}

/// Carries out a design
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute_tasks(&self, design: &Value, context: &CollaborationContext)
        -> Result<Value>;
}

/// Reviews plans and results, and guards against repeated plans
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn review_work(
        &self,
        artifact: &Value,
        objective: &str,
        context: &CollaborationContext,
    ) -> Result<CognitiveCritique>;

    /// Fails with `OvermindError::Stalemate` when `plan` keeps coming back
    async fn detect_loop(&self, history: &[String], plan: &Value) -> Result<()> {
        check_fingerprint(history, &self.compute_plan_hash(plan))
    }

    fn compute_plan_hash(&self, plan: &Value) -> String {
        plan_fingerprint(plan)
    }
}
