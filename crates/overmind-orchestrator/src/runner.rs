//! Deadline-bounded execution of a single collaborator call
//!
//! The runner observes and re-raises. It emits events, records the
//! contribution in the council session and snapshots the outcome to memory,
//! but never retries and never swallows an error.

use overmind_agents::{EventSink, MemoryAgent};
use overmind_core::fail_open::fail_open;
use overmind_core::{CollaborationContext, OvermindError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::council::{summarize, CouncilSession};

/// What is being run, by whom, and for how long at most
#[derive(Debug, Clone)]
pub struct PhaseCall<'a> {
    /// Phase label, used as the event prefix and memory label
    pub phase: &'a str,
    pub agent: &'a str,
    pub deadline: Duration,
    /// Raw input; only its summary is recorded
    pub input: Value,
}

impl<'a> PhaseCall<'a> {
    pub fn new(phase: &'a str, agent: &'a str, deadline: Duration) -> Self {
        Self {
            phase,
            agent,
            deadline,
            input: Value::Null,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }
}

/// Runs collaborator actions under a deadline, with observability side effects
pub struct PhaseRunner {
    events: Arc<dyn EventSink>,
    memory: Arc<dyn MemoryAgent>,
    session: Arc<CouncilSession>,
}

impl PhaseRunner {
    pub fn new(
        events: Arc<dyn EventSink>,
        memory: Arc<dyn MemoryAgent>,
        session: Arc<CouncilSession>,
    ) -> Self {
        Self {
            events,
            memory,
            session,
        }
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn session(&self) -> &Arc<CouncilSession> {
        &self.session
    }

    /// Run `action` bounded by `call.deadline`
    ///
    /// When the deadline wins the race, the in-flight action is dropped and
    /// [`OvermindError::DeadlineExceeded`] is returned.
    pub async fn execute<T, F, Fut>(
        &self,
        call: PhaseCall<'_>,
        context: &CollaborationContext,
        action: F,
    ) -> Result<T>
    where
        T: Serialize + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let PhaseCall {
            phase,
            agent,
            deadline,
            input,
        } = call;

        info!(phase, agent, "phase started");
        self.events
            .emit("phase_start", json!({ "phase": phase, "agent": agent }));

        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, action()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                let payload = serde_json::to_value(&value).unwrap_or_else(|e| {
                    warn!(phase, agent, "output not serializable, recording null: {}", e);
                    Value::Null
                });
                debug!(phase, agent, elapsed_ms, output = %summarize(&payload), "phase completed");
                self.events.emit(
                    &format!("{}_completed", phase),
                    json!({
                        "phase": phase,
                        "agent": agent,
                        "elapsed_ms": elapsed_ms,
                        "output": summarize(&payload),
                    }),
                );
                self.session
                    .record_success(agent, phase, &input, &payload)
                    .await;
                self.snapshot(context, phase, &payload).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(phase, agent, elapsed_ms, "phase failed: {}", err);
                self.events.emit(
                    &format!("{}_failed", phase),
                    json!({ "phase": phase, "agent": agent, "error": err.to_string() }),
                );
                self.record_error(context, phase, agent, &input, &err).await;
                Err(err)
            }
            Err(_) => {
                let err = OvermindError::DeadlineExceeded {
                    phase: phase.to_string(),
                    deadline,
                };
                warn!(phase, agent, "{}", err);
                self.events.emit(
                    &format!("{}_timeout", phase),
                    json!({
                        "phase": phase,
                        "agent": agent,
                        "deadline_ms": deadline.as_millis() as u64,
                        "error": err.to_string(),
                    }),
                );
                self.record_error(context, phase, agent, &input, &err).await;
                Err(err)
            }
        }
    }

    async fn record_error(
        &self,
        context: &CollaborationContext,
        phase: &str,
        agent: &str,
        input: &Value,
        err: &OvermindError,
    ) {
        let message = err.to_string();
        self.session
            .record_failure(agent, phase, input, &message)
            .await;
        let payload = json!({ "agent": agent, "error": message });
        self.snapshot(context, &format!("{}_error", phase), &payload)
            .await;
    }

    async fn snapshot(&self, context: &CollaborationContext, label: &str, payload: &Value) {
        let image = context.snapshot();
        fail_open("phase_runner::capture_memory", || {
            self.memory.capture_memory(&image, label, payload)
        })
        .await;
    }
}
