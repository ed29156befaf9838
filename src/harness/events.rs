//! Progress events streamed during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Channel the controller pushes progress events into.
pub type ProgressSink = UnboundedSender<ProgressEvent>;

/// Kinds of progress events emitted during a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Session created, claims seeded, router decided
    Initialized,
    CycleStart,
    ExpansionComplete,
    CompressionComplete,
    CritiqueComplete,
    /// Critique found enough major flaws to warrant targeted re-expansion
    ReExpansionTriggered,
    ReExpansionComplete,
    BranchingTriggered,
    BranchCreated,
    BranchCycleStart,
    BranchCycleComplete,
    Terminating,
    Complete,
    Error,
}

impl std::fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::CycleStart => "cycle_start",
            Self::ExpansionComplete => "expansion_complete",
            Self::CompressionComplete => "compression_complete",
            Self::CritiqueComplete => "critique_complete",
            Self::ReExpansionTriggered => "re_expansion_triggered",
            Self::ReExpansionComplete => "re_expansion_complete",
            Self::BranchingTriggered => "branching_triggered",
            Self::BranchCreated => "branch_created",
            Self::BranchCycleStart => "branch_cycle_start",
            Self::BranchCycleComplete => "branch_cycle_complete",
            Self::Terminating => "terminating",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One progress event with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "event")]
    pub kind: ProgressKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&ProgressKind::ReExpansionTriggered).unwrap();
        assert_eq!(json, "\"re_expansion_triggered\"");
        assert_eq!(ProgressKind::BranchCycleStart.to_string(), "branch_cycle_start");
    }

    #[test]
    fn test_event_payload() {
        let event = ProgressEvent::new(ProgressKind::CycleStart, json!({"cycle": 2}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "cycle_start");
        assert_eq!(value["data"]["cycle"], 2);
    }
}
