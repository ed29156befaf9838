//! The scratchpad document and its narrow mutation surface.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::Claim;
use crate::config::{BranchPolicy, ScratchpadLimits};
use crate::confidence::{AnalysisMode, ConfidenceModel, CritiqueUpdate};
use crate::markers::{Extraction, MarkerExtractor, SectionKind};

use super::types::{
    EvidenceBalance, EvidenceDirection, KeyEvidence, Section, ThesisBranch, TrajectoryAnalysis,
};

/// Session-scoped working-memory document.
///
/// All state that passes share lives here. Mutations happen only through the
/// methods below, and only the cycle controller calls them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scratchpad {
    pub session_id: String,
    pub title: String,
    pub sections: BTreeMap<SectionKind, Section>,
    /// Anchors exempt from every compression tier
    pub key_evidence: Vec<KeyEvidence>,
    /// Composite confidence after each critique update; the last entry
    /// always equals `current_confidence`
    pub confidence_history: Vec<f64>,
    pub current_confidence: f64,
    pub confidence_model: ConfidenceModel,
    /// Newly extracted marked items per completed cycle
    pub insight_counts: Vec<usize>,
    pub branches: Vec<ThesisBranch>,
    /// Branch the runner is currently developing
    pub current_branch_id: Option<String>,
    pub cycle_count: u32,
    pub limits: ScratchpadLimits,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Scratchpad {
    pub fn new(session_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_mode(session_id, title, AnalysisMode::Forward, ScratchpadLimits::default())
    }

    pub fn with_mode(
        session_id: impl Into<String>,
        title: impl Into<String>,
        mode: AnalysisMode,
        limits: ScratchpadLimits,
    ) -> Self {
        let sections = SectionKind::ALL
            .into_iter()
            .map(|kind| (kind, Section::new(kind)))
            .collect();
        let confidence_model = ConfidenceModel::new(mode);
        let current_confidence = confidence_model.composite();
        let now = Utc::now();

        Self {
            session_id: session_id.into(),
            title: title.into(),
            sections,
            key_evidence: Vec::new(),
            confidence_history: Vec::new(),
            current_confidence,
            confidence_model,
            insight_counts: Vec::new(),
            branches: Vec::new(),
            current_branch_id: None,
            cycle_count: 0,
            limits,
            created: now,
            last_updated: now,
        }
    }

    pub fn section(&self, kind: SectionKind) -> &Section {
        // Every kind is seeded in the constructor and never removed.
        &self.sections[&kind]
    }

    fn section_mut(&mut self, kind: SectionKind) -> &mut Section {
        self.sections.get_mut(&kind).expect("section seeded at construction")
    }

    /// Seed one source claim into the claims section.
    pub fn add_claim(&mut self, claim: &Claim) {
        let quote: String = claim.snippet.chars().take(200).collect();
        let entry = format!(
            "@{} [{}]: {}\n  Quote: \"{}...\"",
            claim.id, claim.kind, claim.text, quote
        );
        if self.section_mut(SectionKind::Claims).push_unique(entry) {
            self.last_updated = Utc::now();
        }
    }

    /// Anchor evidence that must survive every compression.
    pub fn add_key_evidence(
        &mut self,
        content: impl Into<String>,
        source: impl Into<String>,
        strength: f64,
        direction: EvidenceDirection,
    ) {
        let content = content.into();
        if self.key_evidence.iter().any(|e| e.content == content) {
            return;
        }
        self.key_evidence
            .push(KeyEvidence::new(content, source, strength, direction));
        self.last_updated = Utc::now();
    }

    /// Supporting vs challenging totals over the anchors.
    pub fn evidence_balance(&self) -> EvidenceBalance {
        let mut balance = EvidenceBalance::default();
        for evidence in &self.key_evidence {
            match evidence.direction {
                EvidenceDirection::Supports => {
                    balance.supporting_count += 1;
                    balance.supporting_strength += evidence.strength;
                }
                EvidenceDirection::Challenges => {
                    balance.challenging_count += 1;
                    balance.challenging_strength += evidence.strength;
                }
                EvidenceDirection::Neutral => {}
            }
        }
        balance
    }

    /// Run the marker extractor over pass output and merge the results.
    /// Returns the number of newly inserted items.
    pub fn extract_and_merge(&mut self, text: &str) -> usize {
        self.merge_extraction(&MarkerExtractor::extract(text))
    }

    /// Merge an already-parsed extraction. Compresses synchronously if the
    /// token estimate breaches the soft cap afterwards.
    pub fn merge_extraction(&mut self, extraction: &Extraction) -> usize {
        let mut inserted = 0;
        for (kind, content) in &extraction.semantic {
            if self.section_mut(*kind).push_unique(content.clone()) {
                inserted += 1;
            }
        }
        self.last_updated = Utc::now();

        if self.estimate_tokens() > self.limits.max_tokens {
            self.compress();
        }
        inserted
    }

    /// Rough token estimate over section content (4 chars per token).
    pub fn estimate_tokens(&self) -> usize {
        let total_chars: usize = self
            .sections
            .values()
            .map(|section| {
                let items: usize = section.content.iter().map(|c| c.len()).sum();
                // account for the joining spaces
                items + section.content.len().saturating_sub(1)
            })
            .sum();
        total_chars / 4
    }

    /// Two-tier anchored compression.
    ///
    /// Tier 1 truncates volatile sections to the most recent few items;
    /// tier 2 runs only if the budget is still breached and truncates the
    /// preserved sections as well. Key evidence and branch records are never
    /// touched.
    pub fn compress(&mut self) {
        let volatile_keep = self.limits.volatile_keep;
        let preserved_keep = self.limits.preserved_keep;

        for section in self.sections.values_mut() {
            if !section.preserved {
                section.truncate_to_recent(volatile_keep);
            }
        }

        if self.estimate_tokens() > self.limits.max_tokens {
            for section in self.sections.values_mut() {
                if section.preserved {
                    section.truncate_to_recent(preserved_keep);
                }
            }
        }
        self.last_updated = Utc::now();
    }

    /// Apply a critique pass to the confidence model and record the new
    /// composite on the trajectory.
    pub fn apply_critique(&mut self, extraction: &Extraction) -> CritiqueUpdate {
        let update = self.confidence_model.apply_critique(extraction);
        self.confidence_history.push(update.composite);
        self.current_confidence = update.composite;
        self.last_updated = Utc::now();
        update
    }

    pub fn increment_cycle(&mut self) {
        self.cycle_count += 1;
        self.last_updated = Utc::now();
    }

    /// Record the total of newly extracted items for a completed cycle.
    pub fn record_cycle_insights(&mut self, count: usize) {
        self.insight_counts.push(count);
    }

    pub fn open_question_count(&self) -> usize {
        self.section(SectionKind::Questions).content.len()
    }

    /// Confidence trajectory: one composite per critique update.
    pub fn trajectory(&self) -> &[f64] {
        &self.confidence_history
    }

    pub fn analyze_trajectory(&self) -> TrajectoryAnalysis {
        TrajectoryAnalysis::from_series(&self.confidence_history)
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    /// All four branching conditions from the branch policy.
    pub fn should_branch(&self, policy: &BranchPolicy) -> bool {
        self.current_confidence < policy.confidence_threshold
            && self.cycle_count >= policy.min_cycles
            && self.active_branches().len() < policy.max_branches
            && !self.section(SectionKind::Branches).content.is_empty()
    }

    /// Queued `[BRANCH]` proposals, FIFO.
    pub fn branch_proposals(&self) -> Vec<String> {
        self.section(SectionKind::Branches).content.clone()
    }

    /// Consume the proposal queue after scheduling.
    pub fn clear_branch_proposals(&mut self) {
        let section = self.section_mut(SectionKind::Branches);
        section.content.clear();
        section.last_updated = Utc::now();
    }

    /// Open a branch for an alternative thesis. Initial confidence is the
    /// current composite; the parent is whichever branch is being developed.
    pub fn create_branch(&mut self, thesis: impl Into<String>) -> &ThesisBranch {
        let branch = ThesisBranch {
            id: format!("branch-{}", self.branches.len() + 1),
            thesis: thesis.into(),
            confidence: self.current_confidence,
            parent_id: self.current_branch_id.clone(),
            created_cycle: self.cycle_count,
            is_active: true,
        };
        self.branches.push(branch);
        self.last_updated = Utc::now();
        self.branches.last().expect("just pushed")
    }

    pub fn active_branches(&self) -> Vec<&ThesisBranch> {
        self.branches.iter().filter(|b| b.is_active).collect()
    }

    /// Active branch with the highest confidence.
    pub fn winning_branch(&self) -> Option<&ThesisBranch> {
        self.branches
            .iter()
            .filter(|b| b.is_active)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    pub fn set_branch_confidence(&mut self, branch_id: &str, confidence: f64) {
        if let Some(branch) = self.branches.iter_mut().find(|b| b.id == branch_id) {
            branch.confidence = confidence.clamp(0.0, 1.0);
            self.last_updated = Utc::now();
        }
    }

    /// One-way within a session.
    pub fn deactivate_branch(&mut self, branch_id: &str) {
        if let Some(branch) = self.branches.iter_mut().find(|b| b.id == branch_id) {
            branch.is_active = false;
            self.last_updated = Utc::now();
        }
    }

    /// Merge a branch's private scratchpad copy back after a parallel branch
    /// cycle: per section the parent's items keep their order and the copy's
    /// new items follow; key evidence unions with duplicate-content collapse;
    /// branches union keyed by id. Existing branch records are kept as-is
    /// (sibling copies carry stale snapshots of each other); per-branch
    /// confidence updates are applied by the controller after merging.
    pub fn merge_branch_copy(&mut self, copy: &Scratchpad) {
        for (kind, section) in &copy.sections {
            let target = self.section_mut(*kind);
            for item in &section.content {
                target.push_unique(item.clone());
            }
        }

        for evidence in &copy.key_evidence {
            if !self.key_evidence.iter().any(|e| e.content == evidence.content) {
                self.key_evidence.push(evidence.clone());
            }
        }

        for branch in &copy.branches {
            if !self.branches.iter().any(|b| b.id == branch.id) {
                self.branches.push(branch.clone());
            }
        }
        self.last_updated = Utc::now();
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Deterministic markdown view injected into every pass prompt.
    ///
    /// Key evidence always comes first and in full; sections follow in
    /// canonical order, empty ones skipped.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("# Analysis Scratchpad: {}", self.title),
            format!(
                "Cycle: {} | Confidence: {:.0}%",
                self.cycle_count,
                self.current_confidence * 100.0
            ),
        ];

        if !self.confidence_history.is_empty() {
            let trajectory = self
                .confidence_history
                .iter()
                .map(|c| format!("{:.0}%", c * 100.0))
                .collect::<Vec<_>>()
                .join(" → ");
            lines.push(format!("Trajectory: {}", trajectory));
        }
        lines.push(String::new());

        if !self.key_evidence.is_empty() {
            lines.push("## KEY EVIDENCE (Preserved)".to_string());
            for evidence in &self.key_evidence {
                lines.push(format!(
                    "- [{}][{}][{:.1}] {}",
                    evidence.direction.glyph(),
                    evidence.source,
                    evidence.strength,
                    evidence.content
                ));
            }
            let balance = self.evidence_balance();
            lines.push(format!(
                "  Balance: {} supporting vs {} challenging",
                balance.supporting_count, balance.challenging_count
            ));
            lines.push(String::new());
        }

        let active = self.active_branches();
        if !active.is_empty() {
            lines.push("## ACTIVE BRANCHES".to_string());
            for branch in active {
                lines.push(format!(
                    "- [{}][{:.0}%] {}",
                    branch.id,
                    branch.confidence * 100.0,
                    branch.thesis
                ));
            }
            lines.push(String::new());
        }

        for kind in SectionKind::ALL {
            let section = self.section(kind);
            if section.content.is_empty() {
                continue;
            }
            lines.push(format!("## {}", kind.to_string().to_uppercase()));
            for item in &section.content {
                lines.push(format!("- {}", item));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}
