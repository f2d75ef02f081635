//! Council session - who contributed what to a mission
//!
//! Every collaborator call made through the phase runner lands here as a
//! [`ContributionRecord`]. Inputs and outputs are summarized (type plus
//! size or keys) and never stored in full, which keeps the log small and
//! keeps bulk payloads out of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Maximum object keys kept in a summary
const SUMMARY_MAX_KEYS: usize = 20;

/// One collaborator contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// Monotonic per-session sequence number, starting at 1
    pub sequence: u64,
    pub agent: String,
    /// Phase or action label
    pub action: String,
    pub input_summary: Value,
    pub output_summary: Value,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_agent: HashMap<String, usize>,
}

impl SessionSummary {
    pub fn success_rate(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.succeeded as f32 / self.total as f32
    }
}

/// Observability log for one mission run
///
/// Internally synchronized, so a session can be shared by reference with
/// anything that needs to record into it.
#[derive(Debug)]
pub struct CouncilSession {
    session_id: String,
    mission_id: Option<String>,
    records: RwLock<Vec<ContributionRecord>>,
    next_sequence: AtomicU64,
}

impl CouncilSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            mission_id: None,
            records: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
        }
    }

    pub fn for_mission(mission_id: impl Into<String>) -> Self {
        Self {
            mission_id: Some(mission_id.into()),
            ..Self::new()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mission_id(&self) -> Option<&str> {
        self.mission_id.as_deref()
    }

    /// Record a successful contribution, returning its sequence number
    pub async fn record_success(
        &self,
        agent: &str,
        action: &str,
        input: &Value,
        output: &Value,
    ) -> u64 {
        self.push(agent, action, summarize(input), summarize(output), None)
            .await
    }

    /// Record a failed contribution, returning its sequence number
    pub async fn record_failure(&self, agent: &str, action: &str, input: &Value, error: &str) -> u64 {
        self.push(
            agent,
            action,
            summarize(input),
            Value::Null,
            Some(error.to_string()),
        )
        .await
    }

    async fn push(
        &self,
        agent: &str,
        action: &str,
        input_summary: Value,
        output_summary: Value,
        error: Option<String>,
    ) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let record = ContributionRecord {
            sequence,
            agent: agent.to_string(),
            action: action.to_string(),
            input_summary,
            output_summary,
            success: error.is_none(),
            error,
            timestamp: Utc::now(),
        };

        debug!(
            session = %self.session_id,
            sequence,
            agent,
            action,
            success = record.success,
            "council contribution"
        );

        let mut records = self.records.write().await;
        records.push(record);
        sequence
    }

    /// All contributions in sequence order
    pub async fn contributions(&self) -> Vec<ContributionRecord> {
        let records = self.records.read().await;
        let mut out = records.clone();
        out.sort_by_key(|r| r.sequence);
        out
    }

    pub async fn summary(&self) -> SessionSummary {
        let records = self.records.read().await;
        let mut summary = SessionSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records.iter() {
            if record.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            *summary.by_agent.entry(record.agent.clone()).or_insert(0) += 1;
        }
        summary
    }
}

impl Default for CouncilSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Shape-only description of a payload: its type and size, plus the key
/// names for objects
pub fn summarize(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "type": "null" }),
        Value::Bool(_) => json!({ "type": "bool" }),
        Value::Number(_) => json!({ "type": "number" }),
        Value::String(s) => json!({ "type": "string", "size": s.chars().count() }),
        Value::Array(items) => json!({ "type": "array", "size": items.len() }),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.truncate(SUMMARY_MAX_KEYS);
            json!({ "type": "object", "size": map.len(), "keys": keys })
        }
    }
}
