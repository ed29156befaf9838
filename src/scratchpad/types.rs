//! Scratchpad building blocks: sections, key evidence, branches, trajectory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::markers::SectionKind;

/// Whether a piece of evidence supports or challenges the thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceDirection {
    Supports,
    Challenges,
    Neutral,
}

impl EvidenceDirection {
    /// Single-character marker used in the rendered view.
    pub fn glyph(&self) -> char {
        match self {
            Self::Supports => '+',
            Self::Challenges => '-',
            Self::Neutral => 'o',
        }
    }
}

/// Critical evidence that is never compressed.
///
/// Key evidence survives every compression tier byte-identical and in
/// insertion order, and is always rendered in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvidence {
    pub content: String,
    /// Where this came from (e.g. "CLAIM-1", "expansion_pass_2")
    pub source: String,
    /// How compelling, 0-1
    pub strength: f64,
    pub direction: EvidenceDirection,
    pub timestamp: DateTime<Utc>,
}

impl KeyEvidence {
    pub fn new(
        content: impl Into<String>,
        source: impl Into<String>,
        strength: f64,
        direction: EvidenceDirection,
    ) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            strength: strength.clamp(0.0, 1.0),
            direction,
            timestamp: Utc::now(),
        }
    }
}

/// Supporting vs challenging totals over the key-evidence anchors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBalance {
    pub supporting_count: usize,
    pub challenging_count: usize,
    pub supporting_strength: f64,
    pub challenging_strength: f64,
}

impl EvidenceBalance {
    /// Net strength: positive leans supporting.
    pub fn balance(&self) -> f64 {
        self.supporting_strength - self.challenging_strength
    }
}

/// One section of the scratchpad: an ordered list of deduplicated items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub content: Vec<String>,
    pub last_updated: DateTime<Utc>,
    /// Preserved sections resist tier-1 compression
    pub preserved: bool,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            content: Vec::new(),
            last_updated: Utc::now(),
            preserved: kind.preserved(),
        }
    }

    /// Append an item unless an identical one is already present.
    /// Returns true if the item was inserted.
    pub fn push_unique(&mut self, item: impl Into<String>) -> bool {
        let item = item.into();
        if item.is_empty() || self.content.contains(&item) {
            return false;
        }
        self.content.push(item);
        self.last_updated = Utc::now();
        true
    }

    /// Drop everything but the `keep` most recent items.
    pub fn truncate_to_recent(&mut self, keep: usize) {
        if self.content.len() > keep {
            self.content.drain(..self.content.len() - keep);
        }
    }
}

/// An alternative thesis developed in its own expansion/critique sub-cycle.
///
/// Branches form a forest rooted at `parent_id == None`. Deactivation is
/// one-way within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisBranch {
    pub id: String,
    pub thesis: String,
    pub confidence: f64,
    pub parent_id: Option<String>,
    pub created_cycle: u32,
    pub is_active: bool,
}

/// Direction of the last confidence move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for FinalTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Shape of the confidence trajectory. Non-monotonic paths indicate genuine
/// exploration rather than anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryAnalysis {
    pub is_monotonic: bool,
    /// Largest drop below the running maximum
    pub max_dip: f64,
    pub final_trend: FinalTrend,
}

impl Default for TrajectoryAnalysis {
    fn default() -> Self {
        Self {
            is_monotonic: true,
            max_dip: 0.0,
            final_trend: FinalTrend::Stable,
        }
    }
}

impl TrajectoryAnalysis {
    /// Band within which the last move counts as stable.
    const TREND_BAND: f64 = 0.03;

    /// Analyze a confidence series in order.
    pub fn from_series(series: &[f64]) -> Self {
        if series.len() < 2 {
            return Self::default();
        }

        let mut is_monotonic = true;
        let mut max_dip: f64 = 0.0;
        let mut max_so_far = series[0];

        for window in series.windows(2) {
            let (prev, next) = (window[0], window[1]);
            if next < prev {
                is_monotonic = false;
                max_dip = max_dip.max(max_so_far - next);
            }
            max_so_far = max_so_far.max(next);
        }

        let last = series[series.len() - 1];
        let prev = series[series.len() - 2];
        let final_trend = if last > prev + Self::TREND_BAND {
            FinalTrend::Increasing
        } else if last < prev - Self::TREND_BAND {
            FinalTrend::Decreasing
        } else {
            FinalTrend::Stable
        };

        Self {
            is_monotonic,
            max_dip,
            final_trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_dedup() {
        let mut section = Section::new(SectionKind::Insights);
        assert!(section.push_unique("a"));
        assert!(!section.push_unique("a"));
        assert!(section.push_unique("b"));
        assert_eq!(section.content, vec!["a", "b"]);
    }

    #[test]
    fn test_section_truncate_keeps_most_recent() {
        let mut section = Section::new(SectionKind::Risks);
        for i in 0..8 {
            section.push_unique(format!("item-{}", i));
        }
        section.truncate_to_recent(5);
        assert_eq!(
            section.content,
            vec!["item-3", "item-4", "item-5", "item-6", "item-7"]
        );
    }

    #[test]
    fn test_key_evidence_strength_clamped() {
        let evidence = KeyEvidence::new("x", "src", 1.7, EvidenceDirection::Supports);
        assert_eq!(evidence.strength, 1.0);
    }

    #[test]
    fn test_trajectory_monotonic() {
        let analysis = TrajectoryAnalysis::from_series(&[0.5, 0.6, 0.7]);
        assert!(analysis.is_monotonic);
        assert_eq!(analysis.max_dip, 0.0);
        assert_eq!(analysis.final_trend, FinalTrend::Increasing);
    }

    #[test]
    fn test_trajectory_dip() {
        let analysis = TrajectoryAnalysis::from_series(&[0.5, 0.7, 0.4, 0.6]);
        assert!(!analysis.is_monotonic);
        assert!((analysis.max_dip - 0.3).abs() < 1e-12);
        assert_eq!(analysis.final_trend, FinalTrend::Increasing);
    }

    #[test]
    fn test_trajectory_stable_band() {
        let analysis = TrajectoryAnalysis::from_series(&[0.6, 0.62]);
        assert_eq!(analysis.final_trend, FinalTrend::Stable);
    }

    #[test]
    fn test_short_series_defaults() {
        assert_eq!(
            TrajectoryAnalysis::from_series(&[0.5]),
            TrajectoryAnalysis::default()
        );
    }
}
