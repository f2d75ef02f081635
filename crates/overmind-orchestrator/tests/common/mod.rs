//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use overmind_agents::{
    detect_stalemate, Architect, BufferedEventSink, Executor, InMemoryStore, ObjectiveRefiner,
    Planner, RefinedObjective, Reflector, Snippet, SnippetRetriever,
};
use overmind_core::{
    CognitiveCritique, CollaborationContext, OvermindError, PhaseDeadlines, Result, FEEDBACK_KEY,
    STRATEGY_OVERRIDE_KEY,
};
use overmind_orchestrator::{
    AgentCouncil, CouncilSession, GraphEngine, PhaseRunner, SelfCorrectionDriver,
};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the planner saw when it was asked for a plan
#[derive(Debug, Clone)]
pub struct PlannerCall {
    pub objective: String,
    pub feedback: Option<String>,
    pub strategy_override: Option<String>,
}

/// Returns queued plans first, then either a fixed plan or a fresh one per call
pub struct FakePlanner {
    queued: Mutex<VecDeque<Value>>,
    repeat: Option<Value>,
    calls: Arc<Mutex<Vec<PlannerCall>>>,
    notices: Arc<Mutex<Vec<String>>>,
}

impl FakePlanner {
    pub fn fresh() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            repeat: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            notices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn repeating(plan: Value) -> Self {
        Self {
            repeat: Some(plan),
            ..Self::fresh()
        }
    }

    pub fn calls(&self) -> Vec<PlannerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for FakePlanner {
    async fn create_plan(&self, objective: &str, context: &CollaborationContext) -> Result<Value> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(PlannerCall {
                objective: objective.to_string(),
                feedback: context.get_str(FEEDBACK_KEY).map(str::to_string),
                strategy_override: context.get_str(STRATEGY_OVERRIDE_KEY).map(str::to_string),
            });
            calls.len()
        };

        if let Some(plan) = self.queued.lock().unwrap().pop_front() {
            return Ok(plan);
        }
        Ok(match &self.repeat {
            Some(plan) => plan.clone(),
            None => json!({ "steps": [format!("step for attempt {}", attempt)], "attempt": attempt }),
        })
    }

    async fn on_stalemate(&self, instruction: &str) {
        self.notices.lock().unwrap().push(instruction.to_string());
    }
}

/// Reviews plans (artifacts with `steps`) and results separately, approving
/// anything not scripted
pub struct FakeReflector {
    plan_reviews: Mutex<VecDeque<CognitiveCritique>>,
    result_reviews: Mutex<VecDeque<CognitiveCritique>>,
    plan_review_count: AtomicUsize,
    result_review_count: AtomicUsize,
    loop_check_delay: Option<Duration>,
}

impl FakeReflector {
    pub fn approving() -> Self {
        Self {
            plan_reviews: Mutex::new(VecDeque::new()),
            result_reviews: Mutex::new(VecDeque::new()),
            plan_review_count: AtomicUsize::new(0),
            result_review_count: AtomicUsize::new(0),
            loop_check_delay: None,
        }
    }

    pub fn with_plan_reviews(self, reviews: Vec<CognitiveCritique>) -> Self {
        *self.plan_reviews.lock().unwrap() = reviews.into();
        self
    }

    pub fn with_result_reviews(self, reviews: Vec<CognitiveCritique>) -> Self {
        *self.result_reviews.lock().unwrap() = reviews.into();
        self
    }

    pub fn with_slow_loop_check(mut self, delay: Duration) -> Self {
        self.loop_check_delay = Some(delay);
        self
    }

    pub fn plan_reviews(&self) -> usize {
        self.plan_review_count.load(Ordering::SeqCst)
    }

    pub fn result_reviews(&self) -> usize {
        self.result_review_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reflector for FakeReflector {
    async fn review_work(
        &self,
        artifact: &Value,
        _objective: &str,
        _context: &CollaborationContext,
    ) -> Result<CognitiveCritique> {
        let scripted = if artifact.get("steps").is_some() {
            self.plan_review_count.fetch_add(1, Ordering::SeqCst);
            self.plan_reviews.lock().unwrap().pop_front()
        } else {
            self.result_review_count.fetch_add(1, Ordering::SeqCst);
            self.result_reviews.lock().unwrap().pop_front()
        };
        Ok(scripted.unwrap_or_else(|| CognitiveCritique::approved("looks good", 1.0)))
    }

    async fn detect_loop(&self, history: &[String], plan: &Value) -> Result<()> {
        if let Some(delay) = self.loop_check_delay {
            tokio::time::sleep(delay).await;
        }
        detect_stalemate(history, plan)
    }
}

#[derive(Default)]
pub struct FakeArchitect {
    calls: AtomicUsize,
}

impl FakeArchitect {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Architect for FakeArchitect {
    async fn design_solution(&self, plan: &Value, _context: &CollaborationContext) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "design_for": plan }))
    }
}

#[derive(Default)]
pub struct FakeExecutor {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute_tasks(&self, _design: &Value, _context: &CollaborationContext) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(json!({ "output": format!("result {}", n) }))
    }
}

/// Prefixes the objective and counts calls
#[derive(Default)]
pub struct FakeRefiner {
    calls: AtomicUsize,
}

impl FakeRefiner {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectiveRefiner for FakeRefiner {
    async fn refine(&self, objective: &str) -> Result<RefinedObjective> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut metadata = Map::new();
        metadata.insert("refined".to_string(), json!(true));
        Ok(RefinedObjective {
            refined_objective: format!("refined: {}", objective),
            metadata,
        })
    }
}

pub struct FakeRetriever;

#[async_trait]
impl SnippetRetriever for FakeRetriever {
    async fn retrieve(
        &self,
        query: &str,
        _context: &Map<String, Value>,
        _metadata: &Map<String, Value>,
        max_snippets: usize,
    ) -> Result<Vec<Snippet>> {
        let snippets = (0..10)
            .map(|i| Snippet {
                source: format!("doc-{}", i),
                content: format!("about {}", query),
                score: Some(1.0 - i as f64 / 10.0),
            })
            .take(max_snippets)
            .collect();
        Ok(snippets)
    }
}

pub struct FailingRefiner;

#[async_trait]
impl ObjectiveRefiner for FailingRefiner {
    async fn refine(&self, _objective: &str) -> Result<RefinedObjective> {
        Err(OvermindError::Agent("refiner offline".to_string()))
    }
}

pub struct FailingRetriever;

#[async_trait]
impl SnippetRetriever for FailingRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _context: &Map<String, Value>,
        _metadata: &Map<String, Value>,
        _max_snippets: usize,
    ) -> Result<Vec<Snippet>> {
        Err(OvermindError::Agent("index unavailable".to_string()))
    }
}

/// Fakes plus the observers a run writes into
pub struct Harness {
    pub planner: Arc<FakePlanner>,
    pub architect: Arc<FakeArchitect>,
    pub executor: Arc<FakeExecutor>,
    pub reflector: Arc<FakeReflector>,
    pub events: Arc<BufferedEventSink>,
    pub memory: Arc<InMemoryStore>,
    pub session: Arc<CouncilSession>,
}

impl Harness {
    pub fn new(planner: FakePlanner, reflector: FakeReflector) -> Self {
        Self {
            planner: Arc::new(planner),
            architect: Arc::new(FakeArchitect::default()),
            executor: Arc::new(FakeExecutor::default()),
            reflector: Arc::new(reflector),
            events: Arc::new(BufferedEventSink::new()),
            memory: Arc::new(InMemoryStore::new()),
            session: Arc::new(CouncilSession::new()),
        }
    }

    pub fn with_executor(mut self, executor: FakeExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn council(&self) -> AgentCouncil {
        AgentCouncil::new(
            self.planner.clone(),
            self.architect.clone(),
            self.executor.clone(),
            self.reflector.clone(),
        )
    }

    pub fn runner(&self) -> Arc<PhaseRunner> {
        Arc::new(PhaseRunner::new(
            self.events.clone(),
            self.memory.clone(),
            self.session.clone(),
        ))
    }

    pub fn driver(&self, max_iterations: usize) -> SelfCorrectionDriver {
        self.driver_with_deadlines(default_deadlines(), max_iterations)
    }

    pub fn driver_with_deadlines(
        &self,
        deadlines: PhaseDeadlines,
        max_iterations: usize,
    ) -> SelfCorrectionDriver {
        SelfCorrectionDriver::new(&self.council(), self.runner(), &deadlines, max_iterations)
    }

    pub fn graph(&self) -> GraphEngine {
        GraphEngine::new(self.council(), self.runner(), default_deadlines())
    }

    pub fn graph_with(&self, council: AgentCouncil, deadlines: PhaseDeadlines) -> GraphEngine {
        GraphEngine::new(council, self.runner(), deadlines)
    }
}

pub fn default_deadlines() -> PhaseDeadlines {
    PhaseDeadlines::uniform(Duration::from_secs(5))
}

pub fn context(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
