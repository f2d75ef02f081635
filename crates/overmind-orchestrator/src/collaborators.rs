//! The set of collaborators a run talks to

use overmind_agents::{
    Architect, EmptyRetriever, Executor, ObjectiveRefiner, PassthroughRefiner, Planner,
    Reflector, SnippetRetriever,
};
use std::sync::Arc;

/// Shared collaborator handles, cheap to clone and safe to share across
/// concurrently running missions
#[derive(Clone)]
pub struct AgentCouncil {
    pub planner: Arc<dyn Planner>,
    pub architect: Arc<dyn Architect>,
    pub executor: Arc<dyn Executor>,
    pub reflector: Arc<dyn Reflector>,
    /// Graph engine only
    pub refiner: Arc<dyn ObjectiveRefiner>,
    /// Graph engine only
    pub retriever: Arc<dyn SnippetRetriever>,
}

impl AgentCouncil {
    /// Bundle the four council members; refinement and retrieval default to
    /// pass-through implementations
    pub fn new(
        planner: Arc<dyn Planner>,
        architect: Arc<dyn Architect>,
        executor: Arc<dyn Executor>,
        reflector: Arc<dyn Reflector>,
    ) -> Self {
        Self {
            planner,
            architect,
            executor,
            reflector,
            refiner: Arc::new(PassthroughRefiner),
            retriever: Arc::new(EmptyRetriever),
        }
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn ObjectiveRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn SnippetRetriever>) -> Self {
        self.retriever = retriever;
        self
    }
}
