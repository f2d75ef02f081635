//! Process-wide service holding the shared collaborators
//!
//! Collaborator clients are expensive to build and safe to share, so a host
//! installs one [`OvermindService`] at startup and passes it by reference to
//! whatever starts missions. Every mission still gets its own driver, state
//! and council session.

use overmind_agents::{EventSink, MemoryAgent, NoopMemory, TracingEventSink};
use overmind_core::{Mission, OvermindConfig, OvermindError, Result};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::collaborators::AgentCouncil;
use crate::council::CouncilSession;
use crate::driver::{MissionReport, SelfCorrectionDriver};
use crate::graph::{GraphEngine, GraphRun};
use crate::runner::PhaseRunner;

static SERVICE: OnceLock<OvermindService> = OnceLock::new();

pub struct OvermindService {
    council: AgentCouncil,
    config: OvermindConfig,
    events: Arc<dyn EventSink>,
    memory: Arc<dyn MemoryAgent>,
}

impl OvermindService {
    /// Service with default configuration, tracing events and no memory
    pub fn new(council: AgentCouncil) -> Self {
        Self {
            council,
            config: OvermindConfig::default(),
            events: Arc::new(TracingEventSink),
            memory: Arc::new(NoopMemory),
        }
    }

    /// Service configured from `<root>/.overmind/config.toml`
    pub fn from_root(council: AgentCouncil, root: &Path) -> Result<Self> {
        let config = OvermindConfig::load_or_default(root)?;
        Ok(Self::new(council).with_config(config))
    }

    pub fn with_config(mut self, config: OvermindConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryAgent>) -> Self {
        self.memory = memory;
        self
    }

    /// Install the process-wide instance. Fails if one is already installed.
    pub fn install(service: OvermindService) -> Result<&'static OvermindService> {
        if SERVICE.set(service).is_err() {
            return Err(OvermindError::Configuration(
                "Overmind service is already installed".to_string(),
            ));
        }
        info!("overmind service installed");
        Self::global().ok_or_else(|| OvermindError::Other("service not installed".to_string()))
    }

    pub fn global() -> Option<&'static OvermindService> {
        SERVICE.get()
    }

    /// The installed instance, building it with `init` on first use
    pub fn get_or_init(init: impl FnOnce() -> OvermindService) -> &'static OvermindService {
        SERVICE.get_or_init(init)
    }

    pub fn council(&self) -> &AgentCouncil {
        &self.council
    }

    pub fn config(&self) -> &OvermindConfig {
        &self.config
    }

    fn runner(&self, session: CouncilSession) -> Arc<PhaseRunner> {
        Arc::new(PhaseRunner::new(
            self.events.clone(),
            self.memory.clone(),
            Arc::new(session),
        ))
    }

    /// A fresh sequential driver with its own council session
    pub fn driver_for(&self, mission: &Mission) -> SelfCorrectionDriver {
        let runner = self.runner(CouncilSession::for_mission(mission.id.clone()));
        SelfCorrectionDriver::new(
            &self.council,
            runner,
            &self.config.phase_deadlines(),
            self.config.loop_defaults.max_iterations,
        )
    }

    /// A fresh graph engine with its own council session
    pub fn graph_engine(&self) -> GraphEngine {
        let runner = self.runner(CouncilSession::new());
        GraphEngine::new(self.council.clone(), runner, self.config.phase_deadlines())
            .with_loop_defaults(self.config.loop_policy())
            .with_max_snippets(self.config.retrieval.max_snippets)
    }

    /// Run a mission on the sequential engine
    pub async fn run_mission(&self, mission: &Mission) -> Result<MissionReport> {
        self.driver_for(mission).run(mission).await
    }

    /// Run an objective on the graph engine
    pub async fn run_graph(&self, objective: &str, context: Map<String, Value>) -> Result<GraphRun> {
        self.graph_engine().run(objective, context).await
    }
}
