//! Objective refinement and knowledge retrieval
//!
//! Used once per graph-engine run to enrich the raw objective before the
//! first planning pass.

use async_trait::async_trait;
use overmind_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of an [`ObjectiveRefiner`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinedObjective {
    pub refined_objective: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A retrieved piece of supporting knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[async_trait]
pub trait ObjectiveRefiner: Send + Sync {
    async fn refine(&self, objective: &str) -> Result<RefinedObjective>;
}

#[async_trait]
pub trait SnippetRetriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        context: &Map<String, Value>,
        metadata: &Map<String, Value>,
        max_snippets: usize,
    ) -> Result<Vec<Snippet>>;
}

/// Returns the objective unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRefiner;

#[async_trait]
impl ObjectiveRefiner for PassthroughRefiner {
    async fn refine(&self, objective: &str) -> Result<RefinedObjective> {
        let mut metadata = Map::new();
        metadata.insert("refined".to_string(), Value::Bool(false));
        Ok(RefinedObjective {
            refined_objective: objective.to_string(),
            metadata,
        })
    }
}

/// Never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRetriever;

#[async_trait]
impl SnippetRetriever for EmptyRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _context: &Map<String, Value>,
        _metadata: &Map<String, Value>,
        _max_snippets: usize,
    ) -> Result<Vec<Snippet>> {
        Ok(Vec::new())
    }
}
