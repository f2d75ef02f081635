//! Best-effort memory snapshots
//!
//! The engine hands each phase result (or failure) to a memory collaborator.
//! Callers wrap every capture in `fail_open`, so a failing store never
//! affects the mission.

use async_trait::async_trait;
use overmind_core::Result;
use serde_json::Value;
use std::sync::Mutex;

/// External store for phase snapshots
#[async_trait]
pub trait MemoryAgent: Send + Sync {
    /// Store `payload` under `label`, alongside the current context image
    async fn capture_memory(&self, context: &Value, label: &str, payload: &Value) -> Result<()>;
}

/// Discards every snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemory;

#[async_trait]
impl MemoryAgent for NoopMemory {
    async fn capture_memory(&self, _context: &Value, _label: &str, _payload: &Value) -> Result<()> {
        Ok(())
    }
}

/// A captured snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySnapshot {
    pub label: String,
    pub payload: Value,
}

/// Keeps snapshots in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshots: Mutex<Vec<MemorySnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<MemorySnapshot> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.snapshots().into_iter().map(|s| s.label).collect()
    }
}

#[async_trait]
impl MemoryAgent for InMemoryStore {
    async fn capture_memory(&self, _context: &Value, label: &str, payload: &Value) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|e| overmind_core::OvermindError::Memory(e.to_string()))?;
        snapshots.push(MemorySnapshot {
            label: label.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}
