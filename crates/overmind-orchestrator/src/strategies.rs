//! Phase strategies for the sequential engine
//!
//! One strategy per stage of the cycle. Strategies report what happened as a
//! [`PhaseOutcome`] value instead of raising, and the driver decides what to
//! do with it:
//!
//! - `Advance` - move on to the next strategy
//! - `Retry` - abandon this attempt and re-plan (stalemate or rejection)
//! - `Fatal` - stop the mission

use async_trait::async_trait;
use overmind_agents::{AgentRole, Architect, EventSink, Executor, Planner, Reflector};
use overmind_core::{
    CognitiveCritique, CognitivePhase, CognitiveState, CollaborationContext, OvermindError,
    PhaseDeadlines, Result, STRATEGY_OVERRIDE_KEY,
};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::collaborators::AgentCouncil;
use crate::runner::{PhaseCall, PhaseRunner};

/// Instruction written into the context when the planner repeats itself
pub const STALEMATE_INSTRUCTION: &str =
    "Stalemate detected: the last plan repeats earlier attempts. Change strategy immediately.";

static MISSING_CREDENTIALS: OnceLock<Regex> = OnceLock::new();

/// Whether review feedback blames missing upstream credentials or configuration
pub fn indicates_missing_credentials(feedback: &str) -> bool {
    MISSING_CREDENTIALS
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?i)",
                r"\b(missing|no|absent|invalid|expired|not set|not found|without)\W+(\w+\W+){0,3}?(api[ _-]?keys?|credentials?|access tokens?)\b",
                r"|\b(api[ _-]?keys?|credentials?|access tokens?)\W+(\w+\W+){0,3}?(missing|absent|invalid|expired|not set|not found|not provided)\b",
                r"|unauthori[sz]ed|authentication (failed|required)",
                r"|missing (configuration|config|secret)|not configured",
            ))
            .expect("credential pattern is valid")
        })
        .is_match(feedback)
}

/// Why an attempt is being abandoned
#[derive(Debug, Clone, PartialEq)]
pub enum RetryReason {
    /// The planner proposed a plan it had already proposed too often
    Stalemate { fingerprint: String },
    /// The reviewer rejected the plan or the result
    Rejected { feedback: String },
}

/// Result of running one strategy
#[derive(Debug)]
pub enum PhaseOutcome {
    Advance,
    Retry(RetryReason),
    Fatal(OvermindError),
}

impl From<Result<PhaseOutcome>> for PhaseOutcome {
    fn from(result: Result<PhaseOutcome>) -> Self {
        result.unwrap_or_else(PhaseOutcome::Fatal)
    }
}

/// One stage of the plan -> design -> execute -> reflect cycle
#[async_trait]
pub trait PhaseStrategy: Send + Sync {
    fn phase(&self) -> CognitivePhase;

    async fn execute(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> PhaseOutcome;
}

/// Run the reflector's loop check under `deadline`
///
/// Returns the stalemate reason, if any. A check that runs out of time is
/// logged and treated as "no stalemate"; any other error propagates.
pub(crate) async fn check_stalemate(
    reflector: &dyn Reflector,
    history: &[String],
    plan: &Value,
    deadline: Duration,
) -> Result<Option<String>> {
    match tokio::time::timeout(deadline, reflector.detect_loop(history, plan)).await {
        Ok(Ok(())) => Ok(None),
        Ok(Err(err)) if err.is_retryable() => Ok(Some(err.to_string())),
        Ok(Err(err)) => Err(err),
        Err(_) => {
            warn!(
                deadline_ms = deadline.as_millis() as u64,
                "stalemate check timed out, treating plan as new"
            );
            Ok(None)
        }
    }
}

/// Asks the planner for a plan, guards against stalemate, then has the
/// reflector review it
pub struct PlanningStrategy {
    planner: Arc<dyn Planner>,
    reflector: Arc<dyn Reflector>,
    runner: Arc<PhaseRunner>,
    planning_deadline: Duration,
    review_deadline: Duration,
}

impl PlanningStrategy {
    pub fn new(
        planner: Arc<dyn Planner>,
        reflector: Arc<dyn Reflector>,
        runner: Arc<PhaseRunner>,
        deadlines: &PhaseDeadlines,
    ) -> Self {
        Self {
            planner,
            reflector,
            runner,
            planning_deadline: deadlines.planning,
            review_deadline: deadlines.review,
        }
    }

    fn events(&self) -> &Arc<dyn EventSink> {
        self.runner.events()
    }

    async fn plan(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> Result<PhaseOutcome> {
        state.transition(CognitivePhase::Planning)?;
        let objective = state.objective.clone();

        let plan = {
            let ctx = &*context;
            let call = PhaseCall::new(
                CognitivePhase::Planning.label(),
                AgentRole::Strategist.name(),
                self.planning_deadline,
            )
            .with_input(json!({ "objective": objective, "iteration": state.iteration_count }));
            self.runner
                .execute(call, ctx, || self.planner.create_plan(&objective, ctx))
                .await?
        };

        let fingerprint = self.reflector.compute_plan_hash(&plan);
        if let Some(reason) = check_stalemate(
            self.reflector.as_ref(),
            &state.history_hashes,
            &plan,
            self.review_deadline,
        )
        .await?
        {
            warn!(
                mission = %state.mission_id,
                iteration = state.iteration_count,
                "stalemate_detected: {}",
                reason
            );
            self.events().emit(
                "stalemate_detected",
                json!({
                    "mission_id": state.mission_id,
                    "iteration": state.iteration_count,
                    "fingerprint": fingerprint,
                    "reason": reason,
                }),
            );
            context.update(STRATEGY_OVERRIDE_KEY, STALEMATE_INSTRUCTION);
            context.add_trace(json!({
                "event": "stalemate_detected",
                "iteration": state.iteration_count,
                "fingerprint": fingerprint,
            }));
            self.planner.on_stalemate(STALEMATE_INSTRUCTION).await;

            state.plan = Some(plan);
            state.transition(CognitivePhase::RePlanning)?;
            return Ok(PhaseOutcome::Retry(RetryReason::Stalemate { fingerprint }));
        }

        state.history_hashes.push(fingerprint);
        state.plan = Some(plan.clone());
        state.transition(CognitivePhase::ReviewPlan)?;

        let critique = {
            let ctx = &*context;
            let call = PhaseCall::new(
                CognitivePhase::ReviewPlan.label(),
                AgentRole::Auditor.name(),
                self.review_deadline,
            )
            .with_input(plan.clone());
            self.runner
                .execute(call, ctx, || {
                    self.reflector.review_work(&plan, &objective, ctx)
                })
                .await?
        };
        state.critique = Some(critique.clone());

        if critique.approved {
            info!(mission = %state.mission_id, score = critique.score, "plan approved");
            self.events().emit(
                "plan_approved",
                json!({ "mission_id": state.mission_id, "score": critique.score }),
            );
            state.transition(CognitivePhase::Design)?;
            return Ok(PhaseOutcome::Advance);
        }

        let fatal = indicates_missing_credentials(&critique.feedback);
        self.events().emit(
            "plan_rejected",
            json!({
                "mission_id": state.mission_id,
                "score": critique.score,
                "feedback": critique.feedback,
                "fatal": fatal,
            }),
        );
        if fatal {
            return Err(OvermindError::Configuration(critique.feedback));
        }

        info!(mission = %state.mission_id, "plan rejected: {}", critique.feedback);
        state.transition(CognitivePhase::RePlanning)?;
        Ok(PhaseOutcome::Retry(RetryReason::Rejected {
            feedback: critique.feedback,
        }))
    }
}

#[async_trait]
impl PhaseStrategy for PlanningStrategy {
    fn phase(&self) -> CognitivePhase {
        CognitivePhase::Planning
    }

    async fn execute(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> PhaseOutcome {
        self.plan(state, context).await.into()
    }
}

/// Turns the approved plan into a design
pub struct DesignStrategy {
    architect: Arc<dyn Architect>,
    runner: Arc<PhaseRunner>,
    deadline: Duration,
}

impl DesignStrategy {
    pub fn new(architect: Arc<dyn Architect>, runner: Arc<PhaseRunner>, deadline: Duration) -> Self {
        Self {
            architect,
            runner,
            deadline,
        }
    }

    async fn design(
        &self,
        state: &mut CognitiveState,
        context: &CollaborationContext,
    ) -> Result<PhaseOutcome> {
        state.transition(CognitivePhase::Design)?;
        let plan = state
            .plan
            .clone()
            .ok_or_else(|| OvermindError::Other("design requires an approved plan".into()))?;

        let call = PhaseCall::new(
            CognitivePhase::Design.label(),
            AgentRole::Architect.name(),
            self.deadline,
        )
        .with_input(plan.clone());
        let design = self
            .runner
            .execute(call, context, || self.architect.design_solution(&plan, context))
            .await?;

        state.design = Some(design);
        state.transition(CognitivePhase::Execution)?;
        Ok(PhaseOutcome::Advance)
    }
}

#[async_trait]
impl PhaseStrategy for DesignStrategy {
    fn phase(&self) -> CognitivePhase {
        CognitivePhase::Design
    }

    async fn execute(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> PhaseOutcome {
        self.design(state, context).await.into()
    }
}

/// Carries out the design
pub struct ExecutionStrategy {
    executor: Arc<dyn Executor>,
    runner: Arc<PhaseRunner>,
    deadline: Duration,
}

impl ExecutionStrategy {
    pub fn new(executor: Arc<dyn Executor>, runner: Arc<PhaseRunner>, deadline: Duration) -> Self {
        Self {
            executor,
            runner,
            deadline,
        }
    }

    async fn run(
        &self,
        state: &mut CognitiveState,
        context: &CollaborationContext,
    ) -> Result<PhaseOutcome> {
        state.transition(CognitivePhase::Execution)?;
        let design = state
            .design
            .clone()
            .ok_or_else(|| OvermindError::Other("execution requires a design".into()))?;

        let call = PhaseCall::new(
            CognitivePhase::Execution.label(),
            AgentRole::Operator.name(),
            self.deadline,
        )
        .with_input(design.clone());
        let result = self
            .runner
            .execute(call, context, || self.executor.execute_tasks(&design, context))
            .await?;

        state.execution_result = Some(result);
        state.transition(CognitivePhase::Reflection)?;
        Ok(PhaseOutcome::Advance)
    }
}

#[async_trait]
impl PhaseStrategy for ExecutionStrategy {
    fn phase(&self) -> CognitivePhase {
        CognitivePhase::Execution
    }

    async fn execute(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> PhaseOutcome {
        self.run(state, context).await.into()
    }
}

/// Reviews the execution result against the objective
pub struct ReflectionStrategy {
    reflector: Arc<dyn Reflector>,
    runner: Arc<PhaseRunner>,
    deadline: Duration,
}

impl ReflectionStrategy {
    pub fn new(reflector: Arc<dyn Reflector>, runner: Arc<PhaseRunner>, deadline: Duration) -> Self {
        Self {
            reflector,
            runner,
            deadline,
        }
    }

    async fn reflect(
        &self,
        state: &mut CognitiveState,
        context: &CollaborationContext,
    ) -> Result<PhaseOutcome> {
        state.transition(CognitivePhase::Reflection)?;
        let result = state.execution_result.clone().unwrap_or(Value::Null);
        let objective = state.objective.clone();

        let call = PhaseCall::new(
            CognitivePhase::Reflection.label(),
            AgentRole::Auditor.name(),
            self.deadline,
        )
        .with_input(result.clone());
        let critique: CognitiveCritique = self
            .runner
            .execute(call, context, || {
                self.reflector.review_work(&result, &objective, context)
            })
            .await?;

        state.critique = Some(critique.clone());
        if critique.approved {
            return Ok(PhaseOutcome::Advance);
        }

        info!(mission = %state.mission_id, "result rejected: {}", critique.feedback);
        state.transition(CognitivePhase::RePlanning)?;
        Ok(PhaseOutcome::Retry(RetryReason::Rejected {
            feedback: critique.feedback,
        }))
    }
}

#[async_trait]
impl PhaseStrategy for ReflectionStrategy {
    fn phase(&self) -> CognitivePhase {
        CognitivePhase::Reflection
    }

    async fn execute(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> PhaseOutcome {
        self.reflect(state, context).await.into()
    }
}

/// The standard four-stage pipeline, in execution order
pub fn standard_pipeline(
    council: &AgentCouncil,
    runner: Arc<PhaseRunner>,
    deadlines: &PhaseDeadlines,
) -> Vec<Box<dyn PhaseStrategy>> {
    vec![
        Box::new(PlanningStrategy::new(
            council.planner.clone(),
            council.reflector.clone(),
            runner.clone(),
            deadlines,
        )),
        Box::new(DesignStrategy::new(
            council.architect.clone(),
            runner.clone(),
            deadlines.design,
        )),
        Box::new(ExecutionStrategy::new(
            council.executor.clone(),
            runner.clone(),
            deadlines.execution,
        )),
        Box::new(ReflectionStrategy::new(
            council.reflector.clone(),
            runner,
            deadlines.reflection,
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_detection() {
        assert!(indicates_missing_credentials("OPENAI API key is missing"));
        assert!(indicates_missing_credentials("Upstream returned 401 Unauthorized"));
        assert!(indicates_missing_credentials("credentials not found for provider"));
        assert!(indicates_missing_credentials("The model backend is not configured"));
        assert!(indicates_missing_credentials("No API key configured for the provider"));
        assert!(indicates_missing_credentials("the access token has expired"));
        assert!(!indicates_missing_credentials("Bad Plan"));
        assert!(!indicates_missing_credentials(
            "Plan writes credentials to the log; redact them and retry"
        ));
        assert!(!indicates_missing_credentials(
            "Result does not rotate the credential store as asked"
        ));
        assert!(!indicates_missing_credentials("Store the API key in the vault"));
        assert!(!indicates_missing_credentials("Steps are out of order"));
    }

    #[test]
    fn test_outcome_from_error_is_fatal() {
        let outcome: PhaseOutcome = Err(OvermindError::Agent("boom".into())).into();
        assert!(matches!(outcome, PhaseOutcome::Fatal(OvermindError::Agent(_))));

        let outcome: PhaseOutcome = Ok(PhaseOutcome::Advance).into();
        assert!(matches!(outcome, PhaseOutcome::Advance));
    }
}
