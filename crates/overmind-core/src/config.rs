//! Configuration management for Overmind
//!
//! Loop defaults, per-phase deadlines and retrieval limits, loaded from
//! `.overmind/config.toml` under a root directory.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{LoopPolicy, DEFAULT_APPROVAL_SCORE, DEFAULT_MAX_ITERATIONS};
use crate::Result;

/// Engine-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OvermindConfig {
    /// Retry loop defaults
    #[serde(default)]
    pub loop_defaults: LoopDefaults,

    /// Collaborator call deadlines
    #[serde(default)]
    pub deadlines: DeadlineConfig,

    /// Knowledge retrieval for the graph engine
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Default loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDefaults {
    /// Attempts before a mission is declared failed
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Minimum audit score the graph engine accepts
    #[serde(default = "default_approval_score")]
    pub approval_score: f64,
}

/// Deadlines in seconds, one per collaborator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_planning_secs")]
    pub planning_secs: u64,
    #[serde(default = "default_review_secs")]
    pub review_secs: u64,
    #[serde(default = "default_design_secs")]
    pub design_secs: u64,
    #[serde(default = "default_execution_secs")]
    pub execution_secs: u64,
    #[serde(default = "default_reflection_secs")]
    pub reflection_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Snippets requested from the retriever per run
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
}

/// Runtime deadlines handed to phase strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDeadlines {
    pub planning: Duration,
    pub review: Duration,
    pub design: Duration,
    pub execution: Duration,
    pub reflection: Duration,
}

impl PhaseDeadlines {
    /// Same deadline for every phase
    pub fn uniform(deadline: Duration) -> Self {
        Self {
            planning: deadline,
            review: deadline,
            design: deadline,
            execution: deadline,
            reflection: deadline,
        }
    }
}

impl Default for PhaseDeadlines {
    fn default() -> Self {
        Self::from(&DeadlineConfig::default())
    }
}

impl From<&DeadlineConfig> for PhaseDeadlines {
    fn from(config: &DeadlineConfig) -> Self {
        Self {
            planning: Duration::from_secs(config.planning_secs),
            review: Duration::from_secs(config.review_secs),
            design: Duration::from_secs(config.design_secs),
            execution: Duration::from_secs(config.execution_secs),
            reflection: Duration::from_secs(config.reflection_secs),
        }
    }
}

// Default value providers
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_approval_score() -> f64 {
    DEFAULT_APPROVAL_SCORE
}

fn default_planning_secs() -> u64 {
    120
}

fn default_review_secs() -> u64 {
    60
}

fn default_design_secs() -> u64 {
    120
}

// Real work happens during execution, so it gets the longest budget
fn default_execution_secs() -> u64 {
    300
}

fn default_reflection_secs() -> u64 {
    60
}

fn default_max_snippets() -> usize {
    5
}

impl OvermindConfig {
    /// Load configuration from `.overmind/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".overmind/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content).map_err(|e| {
                crate::OvermindError::Config(format!("Failed to parse config file: {}", e))
            })?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.overmind/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".overmind");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            crate::OvermindError::Config(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn phase_deadlines(&self) -> PhaseDeadlines {
        PhaseDeadlines::from(&self.deadlines)
    }

    /// Loop policy with the iteration clamp applied
    pub fn loop_policy(&self) -> LoopPolicy {
        LoopPolicy::new(
            self.loop_defaults.max_iterations,
            self.loop_defaults.approval_score,
        )
    }
}

impl Default for LoopDefaults {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            approval_score: default_approval_score(),
        }
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            planning_secs: default_planning_secs(),
            review_secs: default_review_secs(),
            design_secs: default_design_secs(),
            execution_secs: default_execution_secs(),
            reflection_secs: default_reflection_secs(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_snippets: default_max_snippets(),
        }
    }
}
