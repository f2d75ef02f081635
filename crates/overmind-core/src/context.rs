//! Per-run collaboration scratchpad
//!
//! One context lives for exactly one mission run. Phases of a run execute one
//! at a time, so the context is plain owned data with no interior locking.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key under which the driver stores the previous attempt's critique feedback
pub const FEEDBACK_KEY: &str = "feedback_from_previous_attempt";

/// Key under which planning writes its instruction after a stalemate
pub const STRATEGY_OVERRIDE_KEY: &str = "strategy_override";

/// Shared memory plus an append-only coordination trace
#[derive(Debug, Clone, Default)]
pub struct CollaborationContext {
    shared_memory: HashMap<String, Value>,
    coordination_trace: Vec<Value>,
}

impl CollaborationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed shared memory from a caller-supplied JSON object
    pub fn from_map(initial: &Map<String, Value>) -> Self {
        Self {
            shared_memory: initial
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            coordination_trace: Vec::new(),
        }
    }

    /// Overwrite `key` (last write wins, no merging)
    pub fn update(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared_memory.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.shared_memory.get(key)
    }

    /// Convenience accessor for string values
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn add_trace(&mut self, entry: Value) {
        self.coordination_trace.push(entry);
    }

    /// Trace entries, skipping anything that is not an object
    pub fn get_trace(&self) -> Vec<&Value> {
        self.coordination_trace
            .iter()
            .filter(|entry| entry.is_object())
            .collect()
    }

    pub fn shared_memory(&self) -> &HashMap<String, Value> {
        &self.shared_memory
    }

    /// JSON image of the whole context, handed to memory collaborators
    pub fn snapshot(&self) -> Value {
        let memory: Map<String, Value> = self
            .shared_memory
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let trace: Vec<Value> = self.get_trace().into_iter().cloned().collect();
        serde_json::json!({
            "shared_memory": memory,
            "coordination_trace": trace,
        })
    }
}
