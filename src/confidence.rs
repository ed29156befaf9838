//! Three-dimensional confidence model.
//!
//! Reasoning quality, evidence quality, and conclusion confidence move
//! independently. Reasoning and evidence respond to markers found in the
//! current critique pass only, so a session that stumbles early can recover
//! once later critiques come back clean. The composite is the arithmetic
//! mean of the three scores; a product was rejected as too punitive.

use serde::{Deserialize, Serialize};

use crate::markers::Extraction;

/// Recovery applied to a score when the critique found nothing against it.
const RECOVERY_STEP: f64 = 0.1;
/// Baseline a dirty pass decays from.
const PENALTY_BASE: f64 = 0.9;
/// Penalty per marker found this pass.
const PENALTY_STEP: f64 = 0.15;
/// Floor when at most two markers were found.
const MINOR_FLOOR: f64 = 0.5;
/// Floor for heavier findings.
const MAJOR_FLOOR: f64 = 0.3;
/// Findings above this count use the lower floor.
const MINOR_LIMIT: u32 = 2;

/// Whether hindsight-shaped reasoning is a fallacy or the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Predictive analysis: hindsight and survivorship are fallacies
    Forward,
    /// Case study / post-mortem: hindsight and survivorship are insights
    Retrospective,
}

impl Default for AnalysisMode {
    fn default() -> Self {
        Self::Forward
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Retrospective => write!(f, "retrospective"),
        }
    }
}

/// What one critique pass did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CritiqueUpdate {
    pub cycle_fallacies: u32,
    pub cycle_gaps: u32,
    pub composite: f64,
}

/// Three independent confidence scores plus cumulative critique tallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceModel {
    pub reasoning_quality: f64,
    pub evidence_quality: f64,
    pub conclusion_confidence: f64,
    pub analysis_mode: AnalysisMode,
    /// Total mode-filtered fallacies across the session
    pub fallacies_found: u32,
    /// Total evidence-quality findings across the session
    pub evidence_gaps: u32,
    /// Hindsight/survivorship observations absorbed in retrospective mode
    pub retrospective_insights: u32,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self::new(AnalysisMode::Forward)
    }
}

impl ConfidenceModel {
    pub fn new(analysis_mode: AnalysisMode) -> Self {
        Self {
            reasoning_quality: 1.0,
            evidence_quality: 1.0,
            conclusion_confidence: 0.5,
            analysis_mode,
            fallacies_found: 0,
            evidence_gaps: 0,
            retrospective_insights: 0,
        }
    }

    /// Composite confidence: arithmetic mean of the three scores.
    pub fn composite(&self) -> f64 {
        (self.reasoning_quality + self.evidence_quality + self.conclusion_confidence) / 3.0
    }

    /// Apply one critique pass.
    ///
    /// Scoring is cycle-local: only the markers in `extraction` matter, not
    /// the cumulative tallies. A clean dimension recovers by exactly
    /// [`RECOVERY_STEP`]; a dirty dimension decays from [`PENALTY_BASE`] and
    /// is further capped by the critique's own declared score when one was
    /// emitted.
    pub fn apply_critique(&mut self, extraction: &Extraction) -> CritiqueUpdate {
        let mut cycle_fallacies = extraction.misfit_count() as u32;
        for fallacy in &extraction.fallacies {
            if fallacy.is_mode_sensitive() && self.analysis_mode == AnalysisMode::Retrospective {
                self.retrospective_insights += 1;
            } else {
                cycle_fallacies += 1;
            }
        }
        let cycle_gaps = extraction.evidence_quality.len() as u32;

        self.fallacies_found += cycle_fallacies;
        self.evidence_gaps += cycle_gaps;

        self.reasoning_quality = updated_score(
            self.reasoning_quality,
            cycle_fallacies,
            extraction.declared.reasoning_quality,
        );
        self.evidence_quality = updated_score(
            self.evidence_quality,
            cycle_gaps,
            extraction.declared.evidence_quality,
        );

        if let Some(conclusion) = extraction.declared.conclusion() {
            self.conclusion_confidence = conclusion.clamp(0.0, 1.0);
        }

        CritiqueUpdate {
            cycle_fallacies,
            cycle_gaps,
            composite: self.composite(),
        }
    }
}

fn updated_score(current: f64, findings: u32, declared: Option<f64>) -> f64 {
    if findings == 0 {
        return (current + RECOVERY_STEP).min(1.0);
    }

    let floor = if findings <= MINOR_LIMIT {
        MINOR_FLOOR
    } else {
        MAJOR_FLOOR
    };
    let from_markers = (PENALTY_BASE - PENALTY_STEP * findings as f64).max(floor);

    // The critic's own declared score can only pull further down.
    match declared {
        Some(d) => from_markers.min(d.clamp(0.0, 1.0)),
        None => from_markers,
    }
}
