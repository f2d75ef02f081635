//! Fire-and-forget event sinks
//!
//! The engine emits structured events (`phase_start`, `<phase>_completed`,
//! `stalemate_detected`, ...) for observability. Emitting never fails and
//! never blocks a mission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Default channel capacity for [`BroadcastEventSink`]
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Receives engine events
pub trait EventSink: Send + Sync {
    fn emit(&self, event_type: &str, payload: Value);
}

/// A single emitted event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Writes every event to the `tracing` log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event_type: &str, payload: Value) {
        info!(event = event_type, %payload, "overmind event");
    }
}

/// Fans events out to any number of subscribers
///
/// Events emitted while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<AgentEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event_type: &str, payload: Value) {
        if self.sender.send(AgentEvent::new(event_type, payload)).is_err() {
            debug!(event = event_type, "no event subscribers");
        }
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct BufferedEventSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl BufferedEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event types in emission order
    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

impl EventSink for BufferedEventSink {
    fn emit(&self, event_type: &str, payload: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push(AgentEvent::new(event_type, payload));
        }
    }
}
