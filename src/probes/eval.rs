//! Probe construction, execution, and scoring.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::error::Result;
use crate::markers::SectionKind;
use crate::oracle::Oracle;
use crate::scratchpad::Scratchpad;

use super::types::{Probe, ProbeKind, ProbeOutcome, ProbeReport};

/// `name: value` pairs with numeric or dollar values, mined for recall probes.
static METRIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z_ ]{2,40}):\s*([\d.]+%?|\$[\d.]+[BMK]?)").expect("Invalid regex")
});

/// Words too common to count toward answer overlap.
const STOP_WORDS: [&str; 48] = [
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through", "then",
    "once", "and", "but", "or", "nor", "so", "yet", "both", "not", "only", "than",
];

/// Builds probes from a scratchpad and scores the compressed context.
pub struct ProbeEvaluator {
    oracle: Arc<dyn Oracle>,
    max_probes_per_kind: usize,
    pass_threshold: f64,
    answer_token_cap: u32,
}

impl ProbeEvaluator {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            max_probes_per_kind: 3,
            pass_threshold: 0.6,
            answer_token_cap: 200,
        }
    }

    pub fn with_max_probes_per_kind(mut self, max: usize) -> Self {
        self.max_probes_per_kind = max;
        self
    }

    /// Generate probes of all four kinds from the pre-compression state.
    pub fn build_probes(&self, pad: &Scratchpad) -> Vec<Probe> {
        let mut probes = Vec::new();
        probes.extend(self.recall_probes(pad));
        probes.extend(self.artifact_probes(pad));
        probes.extend(self.continuation_probes(pad));
        probes.extend(self.decision_probes(pad));
        info!(count = probes.len(), "built compression probes");
        probes
    }

    fn recall_probes(&self, pad: &Scratchpad) -> Vec<Probe> {
        let rendered = pad.render();
        let mut probes: Vec<Probe> = METRIC_PATTERN
            .captures_iter(&rendered)
            .take(self.max_probes_per_kind)
            .map(|caps| {
                let name = caps[1].trim().to_string();
                let value = caps[2].to_string();
                Probe::new(
                    ProbeKind::Recall,
                    format!("What is the value of {} mentioned in the analysis?", name),
                    value.clone(),
                    1.0,
                )
                .with_source_quote(format!("{}: {}", name, value))
            })
            .collect();

        // The thesis itself is critical.
        probes.push(
            Probe::new(
                ProbeKind::Recall,
                "What is the main thesis being analyzed?",
                truncate(&pad.title, 200),
                1.5,
            )
            .with_source_quote(pad.title.clone()),
        );

        probes.truncate(self.max_probes_per_kind.max(1));
        probes
    }

    fn artifact_probes(&self, pad: &Scratchpad) -> Vec<Probe> {
        let mut probes: Vec<Probe> = pad
            .key_evidence
            .iter()
            .take(self.max_probes_per_kind)
            .map(|evidence| {
                Probe::new(
                    ProbeKind::Artifact,
                    format!(
                        "Is there key evidence from {} about: {}...?",
                        evidence.source,
                        truncate(&evidence.content, 50)
                    ),
                    truncate(&evidence.content, 100),
                    2.0,
                )
                .with_source_quote(evidence.content.clone())
            })
            .collect();

        let remaining = self.max_probes_per_kind.saturating_sub(probes.len());
        for item in pad.section(SectionKind::Evidence).content.iter().take(remaining) {
            probes.push(
                Probe::new(
                    ProbeKind::Artifact,
                    format!(
                        "What evidence bears on the thesis regarding: {}...?",
                        truncate(item, 30)
                    ),
                    truncate(item, 100),
                    1.5,
                )
                .with_source_quote(item.clone()),
            );
        }
        probes
    }

    fn continuation_probes(&self, pad: &Scratchpad) -> Vec<Probe> {
        let mut probes: Vec<Probe> = pad
            .section(SectionKind::Questions)
            .content
            .iter()
            .take(self.max_probes_per_kind)
            .map(|question| {
                Probe::new(
                    ProbeKind::Continuation,
                    format!("What open question remains about: {}...?", truncate(question, 50)),
                    question.clone(),
                    1.0,
                )
                .with_source_quote(question.clone())
            })
            .collect();

        let remaining = self.max_probes_per_kind.saturating_sub(probes.len());
        for branch in pad.active_branches().into_iter().take(remaining) {
            probes.push(Probe::new(
                ProbeKind::Continuation,
                format!("What alternative thesis is branch {} pursuing?", branch.id),
                branch.thesis.clone(),
                1.0,
            ));
        }

        if probes.is_empty() {
            probes.push(Probe::new(
                ProbeKind::Continuation,
                "What is the next logical step in this analysis?",
                "continue_analysis",
                0.5,
            ));
        }
        probes
    }

    fn decision_probes(&self, pad: &Scratchpad) -> Vec<Probe> {
        let bucket = if pad.current_confidence > 0.7 {
            "high"
        } else if pad.current_confidence > 0.4 {
            "medium"
        } else {
            "low"
        };
        let mut probes = vec![Probe::new(
            ProbeKind::Decision,
            "What is the current confidence level in the thesis (high/medium/low)?",
            bucket,
            1.5,
        )];

        if let Some(decision) = pad.section(SectionKind::Decisions).content.last() {
            probes.push(
                Probe::new(
                    ProbeKind::Decision,
                    "What is the current decision/recommendation?",
                    truncate(decision, 100),
                    2.0,
                )
                .with_source_quote(decision.clone()),
            );
        }
        probes.truncate(self.max_probes_per_kind);
        probes
    }

    /// Ask every probe against the compressed context and score the answers.
    pub async fn run(&self, compressed_context: &str, probes: Vec<Probe>) -> Result<ProbeReport> {
        let mut report = ProbeReport::default();

        for probe in probes {
            let system = "Answer based ONLY on the provided context. If the information is not \
                          present in the context, say \"NOT_FOUND\". Answer concisely \
                          (1-2 sentences max)."
                .to_string();
            let user = format!(
                "<context>\n{}\n</context>\n\nQuestion: {}",
                compressed_context, probe.question
            );

            match self.oracle.invoke(&system, &user, self.answer_token_cap).await {
                Ok(reply) => {
                    let actual = reply.text.trim().to_string();
                    let (score, reasoning) = score_response(&probe.expected_answer, &actual);
                    if score < self.pass_threshold {
                        warn!(
                            kind = %probe.kind,
                            score,
                            question = %truncate(&probe.question, 50),
                            "probe below threshold"
                        );
                    }
                    report.outcomes.push(ProbeOutcome {
                        passed: score >= self.pass_threshold,
                        probe,
                        actual_answer: actual,
                        score,
                        reasoning,
                    });
                }
                Err(err) => {
                    report.outcomes.push(ProbeOutcome {
                        probe,
                        actual_answer: format!("ERROR: {}", err),
                        score: 0.0,
                        reasoning: "Probe execution failed".to_string(),
                        passed: false,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Full pipeline: build from the pre-compression pad, score against the
    /// compressed rendering.
    pub async fn evaluate(&self, pad: &Scratchpad, compressed_context: &str) -> Result<ProbeReport> {
        let probes = self.build_probes(pad);
        self.run(compressed_context, probes).await
    }
}

/// Score one answer against the expected text.
fn score_response(expected: &str, actual: &str) -> (f64, String) {
    let expected_lower = expected.to_lowercase();
    let actual_lower = actual.to_lowercase();

    if actual_lower.contains("not_found") || actual_lower.contains("not present") {
        return (0.0, "Information not found in compressed context".to_string());
    }

    if actual_lower.contains(expected_lower.trim()) || expected_lower.contains(actual_lower.trim())
    {
        return (1.0, "Exact match found".to_string());
    }

    let expected_terms = content_words(&expected_lower);
    let actual_terms = content_words(&actual_lower);

    if expected_terms.is_empty() {
        return (0.5, "Expected answer too generic to evaluate".to_string());
    }

    let overlap = expected_terms.intersection(&actual_terms).count();
    let ratio = overlap as f64 / expected_terms.len() as f64;
    let detail = format!("{}/{} terms", overlap, expected_terms.len());

    if ratio >= 0.8 {
        (0.9, format!("High term overlap ({})", detail))
    } else if ratio >= 0.5 {
        (0.7, format!("Moderate term overlap ({})", detail))
    } else if ratio >= 0.3 {
        (0.5, format!("Partial term overlap ({})", detail))
    } else if ratio > 0.0 {
        (0.3, format!("Low term overlap ({})", detail))
    } else {
        (0.1, "No term overlap - answer may be semantically related".to_string())
    }
}

fn content_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
