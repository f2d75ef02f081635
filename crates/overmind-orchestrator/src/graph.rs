//! Graph engine - the same cycle as an explicit node/edge pipeline
//!
//! ```text
//! contextualizer -> strategist -> architect -> operator -> auditor
//!                        ^                                    |
//!                        +--------- loop_controller <--[loop]-+--[end]--> done
//! ```
//!
//! Nodes read a [`GraphState`] and return a [`GraphUpdate`]; only the runtime
//! writes to the state, by merging updates. The single conditional edge is
//! [`route_after_audit`].
//!
//! Unlike the sequential engine, a stalemate here ends the run.

use overmind_agents::{AgentRole, RefinedObjective, Snippet};
use overmind_core::fail_open::fail_open;
use overmind_core::{
    CognitiveCritique, CognitivePhase, CollaborationContext, LoopPolicy, PhaseDeadlines, Result,
    FEEDBACK_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collaborators::AgentCouncil;
use crate::runner::{PhaseCall, PhaseRunner};
use crate::strategies::{check_stalemate, STALEMATE_INSTRUCTION};

pub const REFINED_OBJECTIVE_KEY: &str = "refined_objective";
pub const OBJECTIVE_METADATA_KEY: &str = "objective_metadata";
pub const KNOWLEDGE_SNIPPETS_KEY: &str = "knowledge_snippets";

/// Default number of snippets the contextualizer asks for
pub const DEFAULT_MAX_SNIPPETS: usize = 5;

/// One step recorded by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub agent: String,
    pub payload: Value,
}

impl TimelineEntry {
    pub fn new(role: AgentRole, payload: Value) -> Self {
        Self {
            agent: role.name().to_string(),
            payload,
        }
    }
}

/// Running state of one graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphState {
    pub objective: String,
    /// Caller-supplied context, read-only for nodes
    pub context: Map<String, Value>,
    pub constraints: Vec<String>,
    pub priority: Option<String>,
    pub shared_memory: Map<String, Value>,
    pub plan: Option<Value>,
    pub design: Option<Value>,
    pub execution: Option<Value>,
    pub audit: Option<CognitiveCritique>,
    pub timeline: Vec<TimelineEntry>,
    /// Current attempt, starting at 1
    pub iteration: usize,
    pub max_iterations: usize,
    pub plan_hashes: Vec<String>,
    pub loop_detected: bool,
}

impl GraphState {
    pub fn new(objective: impl Into<String>, context: Map<String, Value>, policy: &LoopPolicy) -> Self {
        let constraints = match context.get("constraints") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        };
        let priority = context
            .get("priority")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            objective: objective.into(),
            context,
            constraints,
            priority,
            shared_memory: Map::new(),
            plan: None,
            design: None,
            execution: None,
            audit: None,
            timeline: Vec::new(),
            iteration: 1,
            max_iterations: policy.max_iterations,
            plan_hashes: Vec::new(),
            loop_detected: false,
        }
    }

    /// Objective the strategist and auditor work against
    pub fn working_objective(&self) -> &str {
        self.shared_memory
            .get(REFINED_OBJECTIVE_KEY)
            .and_then(Value::as_str)
            .unwrap_or(&self.objective)
    }

    /// Context handed to collaborators: caller context overlaid with shared memory
    pub fn collaboration_context(&self) -> CollaborationContext {
        let mut merged = self.context.clone();
        for (key, value) in &self.shared_memory {
            merged.insert(key.clone(), value.clone());
        }
        if !self.constraints.is_empty() {
            merged.insert("constraints".to_string(), json!(self.constraints));
        }
        if let Some(priority) = &self.priority {
            merged.insert("priority".to_string(), json!(priority));
        }
        CollaborationContext::from_map(&merged)
    }

    /// Merge a node's partial update
    pub fn apply(&mut self, update: GraphUpdate) {
        if let Some(memory) = update.shared_memory {
            self.shared_memory.extend(memory);
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        if let Some(design) = update.design {
            self.design = Some(design);
        }
        if let Some(execution) = update.execution {
            self.execution = Some(execution);
        }
        if let Some(audit) = update.audit {
            self.audit = Some(audit);
        }
        if let Some(iteration) = update.iteration {
            self.iteration = iteration;
        }
        if let Some(loop_detected) = update.loop_detected {
            self.loop_detected = loop_detected;
        }
        self.timeline.extend(update.timeline);
        self.plan_hashes.extend(update.plan_hashes);
    }
}

/// Partial update returned by a node. `None` leaves a field as is; list
/// fields are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphUpdate {
    pub shared_memory: Option<Map<String, Value>>,
    pub plan: Option<Value>,
    pub design: Option<Value>,
    pub execution: Option<Value>,
    pub audit: Option<CognitiveCritique>,
    pub iteration: Option<usize>,
    pub loop_detected: Option<bool>,
    pub timeline: Vec<TimelineEntry>,
    pub plan_hashes: Vec<String>,
}

impl GraphUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn entry(mut self, role: AgentRole, payload: Value) -> Self {
        self.timeline.push(TimelineEntry::new(role, payload));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Contextualizer,
    Strategist,
    Architect,
    Operator,
    Auditor,
    LoopController,
}

impl GraphNode {
    pub fn label(self) -> &'static str {
        match self {
            GraphNode::Contextualizer => "contextualizer",
            GraphNode::Strategist => "strategist",
            GraphNode::Architect => "architect",
            GraphNode::Operator => "operator",
            GraphNode::Auditor => "auditor",
            GraphNode::LoopController => "loop_controller",
        }
    }
}

impl std::fmt::Display for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Loop,
    End,
}

/// The conditional edge after the auditor
pub fn route_after_audit(state: &GraphState, policy: &LoopPolicy) -> Route {
    if state.loop_detected {
        return Route::End;
    }
    if state.iteration >= policy.max_iterations {
        return Route::End;
    }
    match &state.audit {
        Some(audit) if policy.accepts(audit) => Route::End,
        _ => Route::Loop,
    }
}

/// Edge table. `None` means the run is over.
pub fn next_node(current: GraphNode, state: &GraphState, policy: &LoopPolicy) -> Option<GraphNode> {
    match current {
        GraphNode::Contextualizer => Some(GraphNode::Strategist),
        GraphNode::Strategist => Some(GraphNode::Architect),
        GraphNode::Architect => Some(GraphNode::Operator),
        GraphNode::Operator => Some(GraphNode::Auditor),
        GraphNode::Auditor => match route_after_audit(state, policy) {
            Route::Loop => Some(GraphNode::LoopController),
            Route::End => None,
        },
        GraphNode::LoopController => Some(GraphNode::Strategist),
    }
}

/// Retry bookkeeping between attempts
pub fn loop_controller(state: &GraphState) -> GraphUpdate {
    let next = state.iteration + 1;
    let feedback = state
        .audit
        .as_ref()
        .map(|a| a.feedback.clone())
        .unwrap_or_default();

    let mut memory = Map::new();
    memory.insert(FEEDBACK_KEY.to_string(), Value::String(feedback.clone()));

    GraphUpdate {
        iteration: Some(next),
        shared_memory: Some(memory),
        ..Default::default()
    }
    .entry(
        AgentRole::LoopController,
        json!({ "iteration": next, "feedback": feedback }),
    )
}

/// How a graph run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphOutcome {
    Approved,
    LoopDetected,
    Exhausted,
}

impl GraphOutcome {
    pub fn classify(state: &GraphState, policy: &LoopPolicy) -> Self {
        if state.loop_detected {
            return GraphOutcome::LoopDetected;
        }
        match &state.audit {
            Some(audit) if policy.accepts(audit) => GraphOutcome::Approved,
            _ => GraphOutcome::Exhausted,
        }
    }
}

/// Final state of a graph run
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub state: GraphState,
    pub policy: LoopPolicy,
    pub outcome: GraphOutcome,
}

impl GraphRun {
    pub fn approved(&self) -> bool {
        self.outcome == GraphOutcome::Approved
    }
}

pub struct GraphEngine {
    council: AgentCouncil,
    runner: Arc<PhaseRunner>,
    deadlines: PhaseDeadlines,
    loop_defaults: LoopPolicy,
    max_snippets: usize,
}

impl GraphEngine {
    pub fn new(council: AgentCouncil, runner: Arc<PhaseRunner>, deadlines: PhaseDeadlines) -> Self {
        Self {
            council,
            runner,
            deadlines,
            loop_defaults: LoopPolicy::default(),
            max_snippets: DEFAULT_MAX_SNIPPETS,
        }
    }

    /// Policy used for anything the caller context does not set
    pub fn with_loop_defaults(mut self, defaults: LoopPolicy) -> Self {
        self.loop_defaults = defaults;
        self
    }

    pub fn with_max_snippets(mut self, max_snippets: usize) -> Self {
        self.max_snippets = max_snippets;
        self
    }

    /// Run the graph to completion
    ///
    /// Rejections and stalemates end in an `Ok` run classified by
    /// [`GraphOutcome`]; deadline and collaborator errors are returned.
    pub async fn run(&self, objective: &str, context: Map<String, Value>) -> Result<GraphRun> {
        let policy = LoopPolicy::from_context(&context, self.loop_defaults);
        let mut state = GraphState::new(objective, context, &policy);
        info!(
            max_iterations = policy.max_iterations,
            approval_score = policy.approval_score,
            "graph run started"
        );

        let mut node = GraphNode::Contextualizer;
        loop {
            debug!(node = %node, iteration = state.iteration, "entering node");
            let update = match self.run_node(node, &state).await {
                Ok(update) => update,
                Err(err) => {
                    warn!(node = %node, "graph run failed: {}", err);
                    self.runner.events().emit(
                        "mission_failed",
                        json!({ "node": node.label(), "iteration": state.iteration, "error": err.to_string() }),
                    );
                    return Err(err);
                }
            };
            state.apply(update);

            match next_node(node, &state, &policy) {
                Some(next) => node = next,
                None => break,
            }
        }

        let outcome = GraphOutcome::classify(&state, &policy);
        info!(?outcome, iterations = state.iteration, "graph run finished");
        let event = if outcome == GraphOutcome::Approved {
            "mission_completed"
        } else {
            "mission_failed"
        };
        self.runner.events().emit(
            event,
            json!({ "outcome": outcome, "iterations": state.iteration }),
        );

        Ok(GraphRun {
            state,
            policy,
            outcome,
        })
    }

    async fn run_node(&self, node: GraphNode, state: &GraphState) -> Result<GraphUpdate> {
        match node {
            GraphNode::Contextualizer => Ok(self.contextualizer(state).await),
            GraphNode::Strategist => self.strategist(state).await,
            GraphNode::Architect => self.architect(state).await,
            GraphNode::Operator => self.operator(state).await,
            GraphNode::Auditor => self.auditor(state).await,
            GraphNode::LoopController => Ok(loop_controller(state)),
        }
    }

    async fn contextualizer(&self, state: &GraphState) -> GraphUpdate {
        let refined = fail_open("contextualizer::refine", || {
            self.council.refiner.refine(&state.objective)
        })
        .await
        .unwrap_or_else(|| RefinedObjective {
            refined_objective: state.objective.clone(),
            metadata: Map::new(),
        });

        let snippets: Vec<Snippet> = fail_open("contextualizer::retrieve", || {
            self.council.retriever.retrieve(
                &refined.refined_objective,
                &state.context,
                &refined.metadata,
                self.max_snippets,
            )
        })
        .await
        .unwrap_or_default();

        let mut memory = Map::new();
        memory.insert(
            REFINED_OBJECTIVE_KEY.to_string(),
            Value::String(refined.refined_objective.clone()),
        );
        memory.insert(
            OBJECTIVE_METADATA_KEY.to_string(),
            Value::Object(refined.metadata),
        );
        memory.insert(
            KNOWLEDGE_SNIPPETS_KEY.to_string(),
            serde_json::to_value(&snippets).unwrap_or_else(|_| json!([])),
        );

        GraphUpdate {
            shared_memory: Some(memory),
            ..Default::default()
        }
        .entry(
            AgentRole::Contextualizer,
            json!({ "refined_objective": refined.refined_objective, "snippets": snippets.len() }),
        )
    }

    async fn strategist(&self, state: &GraphState) -> Result<GraphUpdate> {
        let ctx = state.collaboration_context();
        let objective = state.working_objective().to_string();

        let call = PhaseCall::new(
            CognitivePhase::Planning.label(),
            AgentRole::Strategist.name(),
            self.deadlines.planning,
        )
        .with_input(json!({ "objective": objective, "iteration": state.iteration }));
        let plan = self
            .runner
            .execute(call, &ctx, || self.council.planner.create_plan(&objective, &ctx))
            .await?;

        let fingerprint = self.council.reflector.compute_plan_hash(&plan);
        if let Some(reason) = check_stalemate(
            self.council.reflector.as_ref(),
            &state.plan_hashes,
            &plan,
            self.deadlines.review,
        )
        .await?
        {
            warn!(iteration = state.iteration, "stalemate_detected: {}", reason);
            self.runner.events().emit(
                "stalemate_detected",
                json!({ "iteration": state.iteration, "fingerprint": fingerprint, "reason": reason }),
            );
            self.council.planner.on_stalemate(STALEMATE_INSTRUCTION).await;

            return Ok(GraphUpdate {
                plan: Some(plan),
                loop_detected: Some(true),
                ..Default::default()
            }
            .entry(
                AgentRole::Strategist,
                json!({ "error": "stalemate", "reason": reason, "fingerprint": fingerprint }),
            ));
        }

        Ok(GraphUpdate {
            plan: Some(plan),
            plan_hashes: vec![fingerprint.clone()],
            ..Default::default()
        }
        .entry(
            AgentRole::Strategist,
            json!({ "iteration": state.iteration, "fingerprint": fingerprint }),
        ))
    }

    async fn architect(&self, state: &GraphState) -> Result<GraphUpdate> {
        if state.loop_detected {
            return Ok(GraphUpdate::default());
        }
        let ctx = state.collaboration_context();
        let plan = state.plan.clone().unwrap_or(Value::Null);

        let call = PhaseCall::new(
            CognitivePhase::Design.label(),
            AgentRole::Architect.name(),
            self.deadlines.design,
        )
        .with_input(plan.clone());
        let design = self
            .runner
            .execute(call, &ctx, || self.council.architect.design_solution(&plan, &ctx))
            .await?;

        Ok(GraphUpdate {
            design: Some(design.clone()),
            ..Default::default()
        }
        .entry(AgentRole::Architect, design))
    }

    async fn operator(&self, state: &GraphState) -> Result<GraphUpdate> {
        if state.loop_detected {
            return Ok(GraphUpdate::default());
        }
        let ctx = state.collaboration_context();
        let design = state.design.clone().unwrap_or(Value::Null);

        let call = PhaseCall::new(
            CognitivePhase::Execution.label(),
            AgentRole::Operator.name(),
            self.deadlines.execution,
        )
        .with_input(design.clone());
        let execution = self
            .runner
            .execute(call, &ctx, || self.council.executor.execute_tasks(&design, &ctx))
            .await?;

        Ok(GraphUpdate {
            execution: Some(execution.clone()),
            ..Default::default()
        }
        .entry(AgentRole::Operator, execution))
    }

    async fn auditor(&self, state: &GraphState) -> Result<GraphUpdate> {
        if state.loop_detected {
            return Ok(GraphUpdate::default());
        }
        let ctx = state.collaboration_context();
        let execution = state.execution.clone().unwrap_or(Value::Null);
        let objective = state.working_objective().to_string();

        let call = PhaseCall::new(
            CognitivePhase::Reflection.label(),
            AgentRole::Auditor.name(),
            self.deadlines.reflection,
        )
        .with_input(execution.clone());
        let audit = self
            .runner
            .execute(call, &ctx, || {
                self.council.reflector.review_work(&execution, &objective, &ctx)
            })
            .await?;

        let payload = serde_json::to_value(&audit)?;
        Ok(GraphUpdate {
            audit: Some(audit),
            ..Default::default()
        }
        .entry(AgentRole::Auditor, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(iteration: usize, audit: Option<CognitiveCritique>, policy: &LoopPolicy) -> GraphState {
        let mut state = GraphState::new("objective", Map::new(), policy);
        state.iteration = iteration;
        state.audit = audit;
        state
    }

    #[test]
    fn test_approved_audit_ends_without_increment() {
        let policy = LoopPolicy::new(3, 0.75);
        let state = state_with(1, Some(CognitiveCritique::approved("great", 0.9)), &policy);
        assert_eq!(route_after_audit(&state, &policy), Route::End);
        assert_eq!(next_node(GraphNode::Auditor, &state, &policy), None);
        assert_eq!(state.iteration, 1);
    }

    #[test]
    fn test_low_score_loops_and_increments_once() {
        let policy = LoopPolicy::new(3, 0.75);
        let mut state = state_with(1, Some(CognitiveCritique::approved("meh", 0.5)), &policy);
        assert_eq!(route_after_audit(&state, &policy), Route::Loop);
        assert_eq!(
            next_node(GraphNode::Auditor, &state, &policy),
            Some(GraphNode::LoopController)
        );

        state.apply(loop_controller(&state));
        assert_eq!(state.iteration, 2);
        assert_eq!(state.shared_memory[FEEDBACK_KEY], "meh");
        assert_eq!(state.timeline.last().unwrap().agent, "LoopController");
        assert_eq!(
            next_node(GraphNode::LoopController, &state, &policy),
            Some(GraphNode::Strategist)
        );
    }

    #[test]
    fn test_cap_and_stalemate_end_the_run() {
        let policy = LoopPolicy::new(2, 0.75);
        let rejected = Some(CognitiveCritique::rejected("no", 0.1));

        let capped = state_with(2, rejected.clone(), &policy);
        assert_eq!(route_after_audit(&capped, &policy), Route::End);

        let mut looped = state_with(1, rejected, &policy);
        looped.loop_detected = true;
        assert_eq!(route_after_audit(&looped, &policy), Route::End);
        assert_eq!(GraphOutcome::classify(&looped, &policy), GraphOutcome::LoopDetected);
    }

    #[test]
    fn test_missing_audit_loops() {
        let policy = LoopPolicy::new(2, 0.75);
        let state = state_with(1, None, &policy);
        assert_eq!(route_after_audit(&state, &policy), Route::Loop);
    }

    #[test]
    fn test_apply_merges_instead_of_replacing() {
        let policy = LoopPolicy::default();
        let mut state = GraphState::new("objective", Map::new(), &policy);
        state.plan = Some(json!({ "steps": 1 }));
        state.shared_memory.insert("keep".into(), json!(true));

        let mut memory = Map::new();
        memory.insert("added".into(), json!(1));
        state.apply(GraphUpdate {
            shared_memory: Some(memory),
            plan_hashes: vec!["h1".into()],
            ..Default::default()
        });

        assert_eq!(state.plan, Some(json!({ "steps": 1 })));
        assert_eq!(state.shared_memory["keep"], true);
        assert_eq!(state.shared_memory["added"], 1);
        assert_eq!(state.plan_hashes, vec!["h1"]);
        assert!(GraphUpdate::default().is_empty());
    }

    #[test]
    fn test_state_reads_constraints_and_priority() {
        let context = json!({
            "constraints": ["no downtime", 7],
            "priority": "high",
            "max_iterations": 100,
        });
        let context = context.as_object().unwrap().clone();
        let policy = LoopPolicy::from_context(&context, LoopPolicy::default());
        let state = GraphState::new("objective", context, &policy);

        assert_eq!(policy.max_iterations, 5);
        assert_eq!(state.max_iterations, 5);
        assert_eq!(state.constraints, vec!["no downtime"]);
        assert_eq!(state.priority.as_deref(), Some("high"));

        let ctx = state.collaboration_context();
        assert_eq!(ctx.get_str("priority"), Some("high"));
    }

    #[test]
    fn test_working_objective_prefers_refined() {
        let policy = LoopPolicy::default();
        let mut state = GraphState::new("raw", Map::new(), &policy);
        assert_eq!(state.working_objective(), "raw");
        state
            .shared_memory
            .insert(REFINED_OBJECTIVE_KEY.into(), json!("refined"));
        assert_eq!(state.working_objective(), "refined");
    }
}
