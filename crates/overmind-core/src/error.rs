//! Unified error types for Overmind

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all Overmind operations
#[derive(Error, Debug)]
pub enum OvermindError {
    // Fatal, never retried
    #[error("Configuration error (fatal): {0}")]
    Configuration(String),

    // Phase control
    #[error("Phase '{phase}' exceeded its deadline of {deadline:?}")]
    DeadlineExceeded { phase: String, deadline: Duration },

    #[error("Stalemate detected: {0}")]
    Stalemate(String),

    #[error("Mission failed after {0} iterations")]
    IterationsExhausted(usize),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Collaborator errors
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Memory capture failed: {0}")]
    Memory(String),

    // Config file errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl OvermindError {
    /// Errors that must terminate a mission immediately
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidTransition { .. } | Self::Config(_)
        )
    }

    /// Errors that the sequential driver treats as a reason to re-plan
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stalemate(_))
    }
}

/// Result type alias using OvermindError
pub type Result<T> = std::result::Result<T, OvermindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_iterations() {
        let err = OvermindError::IterationsExhausted(2);
        assert_eq!(err.to_string(), "Mission failed after 2 iterations");
    }

    #[test]
    fn test_deadline_message() {
        let err = OvermindError::DeadlineExceeded {
            phase: "execution".to_string(),
            deadline: Duration::from_secs(300),
        };
        let msg = err.to_string();
        assert!(msg.contains("execution"));
        assert!(msg.contains("300s"));
    }

    #[test]
    fn test_classification() {
        assert!(OvermindError::Configuration("no key".into()).is_fatal());
        assert!(!OvermindError::Configuration("no key".into()).is_retryable());
        assert!(OvermindError::Stalemate("abc".into()).is_retryable());
        assert!(!OvermindError::Stalemate("abc".into()).is_fatal());
        assert!(!OvermindError::Agent("boom".into()).is_fatal());
    }
}
