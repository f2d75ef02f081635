//! Agent role names shared by both engines

use serde::{Deserialize, Serialize};

/// The four council members plus the engine-side roles of the graph pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Planner
    Strategist,
    /// Designer
    Architect,
    /// Executor
    Operator,
    /// Reflector
    Auditor,
    /// Objective refinement and retrieval
    Contextualizer,
    /// Retry bookkeeping in the graph engine
    LoopController,
}

impl AgentRole {
    /// Display name used in council records and timelines
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::Strategist => "Strategist",
            AgentRole::Architect => "Architect",
            AgentRole::Operator => "Operator",
            AgentRole::Auditor => "Auditor",
            AgentRole::Contextualizer => "Contextualizer",
            AgentRole::LoopController => "LoopController",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(|c: char| c == '_' || c == '-', "").as_str() {
            "strategist" | "planner" => Ok(AgentRole::Strategist),
            "architect" => Ok(AgentRole::Architect),
            "operator" | "executor" => Ok(AgentRole::Operator),
            "auditor" | "reflector" => Ok(AgentRole::Auditor),
            "contextualizer" => Ok(AgentRole::Contextualizer),
            "loopcontroller" => Ok(AgentRole::LoopController),
            _ => Err(format!("Invalid agent role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(AgentRole::Strategist.name(), "Strategist");
        assert_eq!(AgentRole::Operator.to_string(), "Operator");
    }

    #[test]
    fn test_role_from_str_accepts_aliases() {
        assert_eq!("planner".parse::<AgentRole>().unwrap(), AgentRole::Strategist);
        assert_eq!("Reflector".parse::<AgentRole>().unwrap(), AgentRole::Auditor);
        assert_eq!("loop_controller".parse::<AgentRole>().unwrap(), AgentRole::LoopController);
        assert!("janitor".parse::<AgentRole>().is_err());
    }
}
