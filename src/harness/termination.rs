//! Termination detection: saturation, diminishing returns, stability, caps.

use serde::{Deserialize, Serialize};

use crate::config::TerminationPolicy;
use crate::scratchpad::Scratchpad;

/// Why a session stopped. Closed set; serialized snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MaxCyclesReached,
    ConfidenceSaturated,
    DiminishingReturns,
    HighConfidenceStable,
    /// Caller cancelled; surfaced as a result, not an error
    Cancelled,
    /// Oracle failed after retries; partial result returned
    TransportError,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MaxCyclesReached => "max_cycles_reached",
            Self::ConfidenceSaturated => "confidence_saturated",
            Self::DiminishingReturns => "diminishing_returns",
            Self::HighConfidenceStable => "high_confidence_stable",
            Self::Cancelled => "cancelled",
            Self::TransportError => "transport_error",
        };
        write!(f, "{}", s)
    }
}

/// Evaluate the termination criteria after a main cycle.
///
/// Order matters and is load-bearing: the hard cap first, then saturation,
/// then diminishing returns, then high-confidence stability. Diminishing
/// returns firing ahead of a simultaneously-true stability condition is
/// intentional (early exit on the stronger signal).
pub fn check_termination(
    pad: &Scratchpad,
    policy: &TerminationPolicy,
    max_cycles: u32,
) -> Option<TerminationReason> {
    if pad.cycle_count >= max_cycles {
        return Some(TerminationReason::MaxCyclesReached);
    }

    // Trend criteria need at least two completed cycles.
    if pad.cycle_count < 2 {
        return None;
    }

    let history = pad.trajectory();
    if history.len() >= policy.saturation_window {
        let window = &history[history.len() - policy.saturation_window..];
        let flat = window
            .windows(2)
            .all(|pair| (pair[1] - pair[0]).abs() < policy.saturation_delta);
        if flat {
            return Some(TerminationReason::ConfidenceSaturated);
        }
    }

    if let [.., previous, latest] = &pad.insight_counts[..] {
        if *previous > 0 && (*latest as f64) < policy.insight_ratio * (*previous as f64) {
            return Some(TerminationReason::DiminishingReturns);
        }
    }

    if pad.current_confidence >= policy.high_confidence
        && pad.open_question_count() < policy.max_open_questions
    {
        return Some(TerminationReason::HighConfidenceStable);
    }

    None
}
