//! Self-correction driver - the sequential engine
//!
//! Runs the phase pipeline once per attempt. A rejected plan or result feeds
//! its critique back into the collaboration context and starts a fresh
//! attempt; a stalemate starts a fresh attempt with the override instruction
//! the planning strategy left behind. Fatal and deadline errors end the
//! mission immediately.

use overmind_core::{
    CognitiveCritique, CognitiveState, CollaborationContext, Mission, MissionId, OvermindError,
    PhaseDeadlines, Result, FEEDBACK_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collaborators::AgentCouncil;
use crate::council::SessionSummary;
use crate::runner::PhaseRunner;
use crate::strategies::{standard_pipeline, PhaseOutcome, PhaseStrategy, RetryReason};

/// Outcome of a successful mission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionReport {
    pub mission_id: MissionId,
    pub execution_result: Value,
    /// Attempts used, including the successful one
    pub iterations: usize,
    pub critique: Option<CognitiveCritique>,
    pub council: SessionSummary,
}

/// Drives one mission through the plan -> design -> execute -> reflect cycle
pub struct SelfCorrectionDriver {
    pipeline: Vec<Box<dyn PhaseStrategy>>,
    runner: Arc<PhaseRunner>,
    max_iterations: usize,
}

impl SelfCorrectionDriver {
    /// Driver running the standard four-stage pipeline
    pub fn new(
        council: &AgentCouncil,
        runner: Arc<PhaseRunner>,
        deadlines: &PhaseDeadlines,
        max_iterations: usize,
    ) -> Self {
        let pipeline = standard_pipeline(council, runner.clone(), deadlines);
        Self::with_pipeline(pipeline, runner, max_iterations)
    }

    /// Driver running a custom pipeline, in the given order
    pub fn with_pipeline(
        pipeline: Vec<Box<dyn PhaseStrategy>>,
        runner: Arc<PhaseRunner>,
        max_iterations: usize,
    ) -> Self {
        Self {
            pipeline,
            runner,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run a mission from a fresh state and context
    pub async fn run(&self, mission: &Mission) -> Result<MissionReport> {
        let mut state = CognitiveState::new(mission, self.max_iterations);
        let mut context = CollaborationContext::new();

        let execution_result = self.run_with_state(&mut state, &mut context).await?;

        Ok(MissionReport {
            mission_id: state.mission_id.clone(),
            execution_result,
            iterations: state.iteration_count,
            critique: state.critique.clone(),
            council: self.runner.session().summary().await,
        })
    }

    /// Run against caller-owned state and context, leaving both in their
    /// final shape for inspection
    pub async fn run_with_state(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> Result<Value> {
        state.max_iterations = self.max_iterations;
        info!(
            mission = %state.mission_id,
            max_iterations = self.max_iterations,
            "mission started"
        );

        for attempt in 1..=self.max_iterations {
            state.iteration_count = attempt;
            if let Err(err) = state.reenter_planning() {
                return Err(self.fail(state, err));
            }
            info!(mission = %state.mission_id, "=== Attempt {} of {} ===", attempt, self.max_iterations);

            match self.run_attempt(state, context).await {
                Ok(None) => {
                    let result = state.execution_result.clone().unwrap_or(Value::Null);
                    info!(mission = %state.mission_id, iterations = attempt, "mission completed");
                    self.runner.events().emit(
                        "mission_completed",
                        json!({ "mission_id": state.mission_id, "iterations": attempt }),
                    );
                    return Ok(result);
                }
                Ok(Some(RetryReason::Stalemate { fingerprint })) => {
                    debug!(mission = %state.mission_id, %fingerprint, "retrying after stalemate");
                }
                Ok(Some(RetryReason::Rejected { feedback })) => {
                    debug!(mission = %state.mission_id, "retrying with feedback: {}", feedback);
                    context.update(FEEDBACK_KEY, feedback);
                }
                Err(err) => return Err(self.fail(state, err)),
            }
        }

        Err(self.fail(state, OvermindError::IterationsExhausted(self.max_iterations)))
    }

    /// Walk the pipeline once. `Ok(None)` means every strategy advanced.
    async fn run_attempt(
        &self,
        state: &mut CognitiveState,
        context: &mut CollaborationContext,
    ) -> Result<Option<RetryReason>> {
        for strategy in &self.pipeline {
            let phase = strategy.phase();
            debug!(mission = %state.mission_id, %phase, "running strategy");
            match strategy.execute(state, context).await {
                PhaseOutcome::Advance => {}
                PhaseOutcome::Retry(reason) => {
                    debug!(mission = %state.mission_id, %phase, ?reason, "attempt abandoned");
                    return Ok(Some(reason));
                }
                PhaseOutcome::Fatal(err) => {
                    warn!(mission = %state.mission_id, %phase, "strategy failed: {}", err);
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    fn fail(&self, state: &CognitiveState, err: OvermindError) -> OvermindError {
        warn!(mission = %state.mission_id, iteration = state.iteration_count, "mission failed: {}", err);
        self.runner.events().emit(
            "mission_failed",
            json!({
                "mission_id": state.mission_id,
                "iteration": state.iteration_count,
                "phase": state.current_phase.label(),
                "fatal": err.is_fatal(),
                "error": err.to_string(),
            }),
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::CouncilSession;
    use async_trait::async_trait;
    use overmind_agents::{BufferedEventSink, NoopMemory};
    use overmind_core::CognitivePhase;
    use std::sync::Mutex;

    /// Replays a fixed list of outcomes, one per call
    struct Scripted {
        phase: CognitivePhase,
        outcomes: Mutex<Vec<PhaseOutcome>>,
        calls: Arc<Mutex<usize>>,
    }

    impl Scripted {
        fn new(phase: CognitivePhase, mut outcomes: Vec<PhaseOutcome>) -> (Self, Arc<Mutex<usize>>) {
            outcomes.reverse();
            let calls = Arc::new(Mutex::new(0));
            (
                Self {
                    phase,
                    outcomes: Mutex::new(outcomes),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl PhaseStrategy for Scripted {
        fn phase(&self) -> CognitivePhase {
            self.phase
        }

        async fn execute(
            &self,
            state: &mut CognitiveState,
            _context: &mut CollaborationContext,
        ) -> PhaseOutcome {
            *self.calls.lock().unwrap() += 1;
            state.execution_result = Some(json!({ "attempt": state.iteration_count }));
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(PhaseOutcome::Advance)
        }
    }

    fn runner() -> (Arc<PhaseRunner>, Arc<BufferedEventSink>) {
        let events = Arc::new(BufferedEventSink::new());
        let runner = PhaseRunner::new(
            events.clone(),
            Arc::new(NoopMemory),
            Arc::new(CouncilSession::new()),
        );
        (Arc::new(runner), events)
    }

    #[tokio::test]
    async fn test_rejection_feedback_lands_in_context() {
        let (runner, events) = runner();
        let (strategy, calls) = Scripted::new(
            CognitivePhase::Planning,
            vec![PhaseOutcome::Retry(RetryReason::Rejected {
                feedback: "Too vague".into(),
            })],
        );
        let driver = SelfCorrectionDriver::with_pipeline(vec![Box::new(strategy)], runner, 3);

        let mission = Mission::with_id("m-1", "ship it");
        let mut state = CognitiveState::new(&mission, 3);
        let mut context = CollaborationContext::new();
        let result = driver.run_with_state(&mut state, &mut context).await.unwrap();

        assert_eq!(result["attempt"], 2);
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(context.get_str(FEEDBACK_KEY), Some("Too vague"));
        assert_eq!(events.count("mission_completed"), 1);
    }

    #[tokio::test]
    async fn test_stalemate_consumes_an_attempt() {
        let (runner, _events) = runner();
        let stalemate = || {
            PhaseOutcome::Retry(RetryReason::Stalemate {
                fingerprint: "abc".into(),
            })
        };
        let (strategy, calls) =
            Scripted::new(CognitivePhase::Planning, vec![stalemate(), stalemate()]);
        let driver = SelfCorrectionDriver::with_pipeline(vec![Box::new(strategy)], runner, 2);

        let err = driver.run(&Mission::new("loop forever")).await.unwrap_err();
        assert!(matches!(err, OvermindError::IterationsExhausted(2)));
        assert!(!err.is_fatal());
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let (runner, events) = runner();
        let (first, _) = Scripted::new(
            CognitivePhase::Planning,
            vec![PhaseOutcome::Fatal(OvermindError::Configuration(
                "missing api key".into(),
            ))],
        );
        let (second, second_calls) = Scripted::new(CognitivePhase::Design, vec![]);
        let driver = SelfCorrectionDriver::with_pipeline(
            vec![Box::new(first), Box::new(second)],
            runner,
            5,
        );

        let err = driver.run(&Mission::new("x")).await.unwrap_err();
        assert!(matches!(err, OvermindError::Configuration(_)));
        assert_eq!(*second_calls.lock().unwrap(), 0);
        assert_eq!(events.count("mission_failed"), 1);

        let failed = events.events().pop().unwrap();
        assert_eq!(failed.event_type, "mission_failed");
        assert_eq!(failed.payload["fatal"], true);
        assert_eq!(failed.payload["phase"], "planning");
    }

    #[test]
    fn test_max_iterations_floor() {
        let (runner, _) = runner();
        let driver = SelfCorrectionDriver::with_pipeline(Vec::new(), runner, 0);
        assert_eq!(driver.max_iterations(), 1);
    }
}
