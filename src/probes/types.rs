//! Probe types and aggregate reporting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a probe tests about the compressed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Can specific facts be recalled?
    Recall,
    /// Are key evidence items preserved?
    Artifact,
    /// Can reasoning continue coherently?
    Continuation,
    /// Would the same decision be reached?
    Decision,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Recall => "recall",
            Self::Artifact => "artifact",
            Self::Continuation => "continuation",
            Self::Decision => "decision",
        };
        write!(f, "{}", s)
    }
}

/// A single question to ask against the compressed context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub kind: ProbeKind,
    pub question: String,
    pub expected_answer: String,
    /// Original text this probe tests, when applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quote: Option<String>,
    /// Importance weight for the overall score
    pub weight: f64,
}

impl Probe {
    pub fn new(
        kind: ProbeKind,
        question: impl Into<String>,
        expected_answer: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            kind,
            question: question.into(),
            expected_answer: expected_answer.into(),
            source_quote: None,
            weight,
        }
    }

    pub fn with_source_quote(mut self, quote: impl Into<String>) -> Self {
        self.source_quote = Some(quote.into());
        self
    }
}

/// Result of running a single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub probe: Probe,
    pub actual_answer: String,
    /// 0.0 to 1.0
    pub score: f64,
    pub reasoning: String,
    pub passed: bool,
}

/// Per-kind score breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    pub count: usize,
    pub passed: usize,
    pub avg_score: f64,
}

/// Aggregate results from all probes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub outcomes: Vec<ProbeOutcome>,
}

impl ProbeReport {
    /// Weight-weighted mean score across all probes.
    pub fn overall_score(&self) -> f64 {
        let total_weight: f64 = self.outcomes.iter().map(|o| o.probe.weight).sum();
        if total_weight == 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .outcomes
            .iter()
            .map(|o| o.score * o.probe.weight)
            .sum();
        weighted / total_weight
    }

    /// Fraction of probes that passed.
    pub fn pass_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.outcomes.iter().filter(|o| o.passed).count() as f64 / self.outcomes.len() as f64
    }

    /// Scores broken down by probe kind.
    pub fn by_kind(&self) -> BTreeMap<ProbeKind, KindStats> {
        let mut stats: BTreeMap<ProbeKind, KindStats> = BTreeMap::new();
        for outcome in &self.outcomes {
            let entry = stats.entry(outcome.probe.kind).or_default();
            entry.count += 1;
            if outcome.passed {
                entry.passed += 1;
            }
            entry.avg_score += outcome.score;
        }
        for entry in stats.values_mut() {
            entry.avg_score /= entry.count as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: ProbeKind, score: f64, weight: f64) -> ProbeOutcome {
        ProbeOutcome {
            probe: Probe::new(kind, "q", "a", weight),
            actual_answer: "a".to_string(),
            score,
            reasoning: String::new(),
            passed: score >= 0.6,
        }
    }

    #[test]
    fn test_overall_score_is_weighted() {
        let report = ProbeReport {
            outcomes: vec![
                outcome(ProbeKind::Artifact, 1.0, 2.0),
                outcome(ProbeKind::Recall, 0.0, 1.0),
            ],
        };
        assert!((report.overall_score() - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.pass_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_by_kind_breakdown() {
        let report = ProbeReport {
            outcomes: vec![
                outcome(ProbeKind::Recall, 0.9, 1.0),
                outcome(ProbeKind::Recall, 0.5, 1.0),
                outcome(ProbeKind::Decision, 1.0, 2.0),
            ],
        };
        let stats = report.by_kind();
        assert_eq!(stats[&ProbeKind::Recall].count, 2);
        assert_eq!(stats[&ProbeKind::Recall].passed, 1);
        assert!((stats[&ProbeKind::Recall].avg_score - 0.7).abs() < 1e-12);
        assert_eq!(stats[&ProbeKind::Decision].passed, 1);
    }

    #[test]
    fn test_empty_report() {
        let report = ProbeReport::default();
        assert_eq!(report.overall_score(), 0.0);
        assert_eq!(report.pass_rate(), 0.0);
    }
}
