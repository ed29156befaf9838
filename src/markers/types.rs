//! Closed marker vocabularies and scratchpad section kinds.

use serde::{Deserialize, Serialize};

/// Scratchpad sections, in canonical render order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Claims,
    Insights,
    Evidence,
    Risks,
    Counters,
    Questions,
    Patterns,
    Decisions,
    Meta,
    Branches,
}

impl SectionKind {
    /// All sections in render order.
    pub const ALL: [SectionKind; 10] = [
        Self::Claims,
        Self::Insights,
        Self::Evidence,
        Self::Risks,
        Self::Counters,
        Self::Questions,
        Self::Patterns,
        Self::Decisions,
        Self::Meta,
        Self::Branches,
    ];

    /// Whether the section resists tier-1 compression.
    pub fn preserved(&self) -> bool {
        match self {
            Self::Claims
            | Self::Insights
            | Self::Evidence
            | Self::Counters
            | Self::Patterns
            | Self::Decisions => true,
            Self::Risks | Self::Questions | Self::Meta | Self::Branches => false,
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Claims => "claims",
            Self::Insights => "insights",
            Self::Evidence => "evidence",
            Self::Risks => "risks",
            Self::Counters => "counters",
            Self::Questions => "questions",
            Self::Patterns => "patterns",
            Self::Decisions => "decisions",
            Self::Meta => "meta",
            Self::Branches => "branches",
        };
        write!(f, "{}", s)
    }
}

/// Content-bearing markers whose payload is harvested into a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SemanticMarker {
    Insight,
    Evidence,
    Risk,
    Counter,
    Pattern,
    Question,
    Decision,
    Meta,
    Branch,
}

impl SemanticMarker {
    /// Bracket tag name as it appears in oracle output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Insight => "INSIGHT",
            Self::Evidence => "EVIDENCE",
            Self::Risk => "RISK",
            Self::Counter => "COUNTER",
            Self::Pattern => "PATTERN",
            Self::Question => "QUESTION",
            Self::Decision => "DECISION",
            Self::Meta => "META",
            Self::Branch => "BRANCH",
        }
    }

    /// Section the marker content is merged into.
    pub fn section(&self) -> SectionKind {
        match self {
            Self::Insight => SectionKind::Insights,
            Self::Evidence => SectionKind::Evidence,
            Self::Risk => SectionKind::Risks,
            Self::Counter => SectionKind::Counters,
            Self::Pattern => SectionKind::Patterns,
            Self::Question => SectionKind::Questions,
            Self::Decision => SectionKind::Decisions,
            Self::Meta => SectionKind::Meta,
            Self::Branch => SectionKind::Branches,
        }
    }

    pub(crate) fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "INSIGHT" => Some(Self::Insight),
            "EVIDENCE" => Some(Self::Evidence),
            "RISK" => Some(Self::Risk),
            "COUNTER" => Some(Self::Counter),
            "PATTERN" => Some(Self::Pattern),
            "QUESTION" => Some(Self::Question),
            "DECISION" => Some(Self::Decision),
            "META" => Some(Self::Meta),
            "BRANCH" => Some(Self::Branch),
            _ => None,
        }
    }
}

/// Critique-only markers calibrating the dialectical quality of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialecticalMarker {
    TooGranular,
    TooAbstract,
    RightLevel,
    TensionFound,
    TensionMissing,
    TensionWrong,
    Framework,
    Novel,
    Misapplied,
    Transferable,
    CaseSpecific,
    Universal,
    Reframe,
    Elevate,
}

impl DialecticalMarker {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TooGranular => "TOO_GRANULAR",
            Self::TooAbstract => "TOO_ABSTRACT",
            Self::RightLevel => "RIGHT_LEVEL",
            Self::TensionFound => "TENSION_FOUND",
            Self::TensionMissing => "TENSION_MISSING",
            Self::TensionWrong => "TENSION_WRONG",
            Self::Framework => "FRAMEWORK",
            Self::Novel => "NOVEL",
            Self::Misapplied => "MISAPPLIED",
            Self::Transferable => "TRANSFERABLE",
            Self::CaseSpecific => "CASE_SPECIFIC",
            Self::Universal => "UNIVERSAL",
            Self::Reframe => "REFRAME",
            Self::Elevate => "ELEVATE",
        }
    }

    /// Misfit markers count against reasoning quality.
    pub fn is_misfit(&self) -> bool {
        matches!(
            self,
            Self::TooGranular
                | Self::TooAbstract
                | Self::TensionMissing
                | Self::TensionWrong
                | Self::Misapplied
                | Self::CaseSpecific
        )
    }

    pub(crate) fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "TOO_GRANULAR" => Some(Self::TooGranular),
            "TOO_ABSTRACT" => Some(Self::TooAbstract),
            "RIGHT_LEVEL" => Some(Self::RightLevel),
            "TENSION_FOUND" => Some(Self::TensionFound),
            "TENSION_MISSING" => Some(Self::TensionMissing),
            "TENSION_WRONG" => Some(Self::TensionWrong),
            "FRAMEWORK" => Some(Self::Framework),
            "NOVEL" => Some(Self::Novel),
            "MISAPPLIED" => Some(Self::Misapplied),
            "TRANSFERABLE" => Some(Self::Transferable),
            "CASE_SPECIFIC" => Some(Self::CaseSpecific),
            "UNIVERSAL" => Some(Self::Universal),
            "REFRAME" => Some(Self::Reframe),
            "ELEVATE" => Some(Self::Elevate),
            _ => None,
        }
    }
}

/// Reasoning-fallacy markers. Hindsight and survivorship flip meaning in
/// retrospective mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallacyMarker {
    Confirmation,
    Anchoring,
    Availability,
    Narrative,
    Hindsight,
    Survivorship,
}

impl FallacyMarker {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Confirmation => "CONFIRMATION",
            Self::Anchoring => "ANCHORING",
            Self::Availability => "AVAILABILITY",
            Self::Narrative => "NARRATIVE",
            Self::Hindsight => "HINDSIGHT",
            Self::Survivorship => "SURVIVORSHIP",
        }
    }

    /// In retrospective mode these become retrospective insights instead of
    /// fallacies.
    pub fn is_mode_sensitive(&self) -> bool {
        matches!(self, Self::Hindsight | Self::Survivorship)
    }

    pub(crate) fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CONFIRMATION" => Some(Self::Confirmation),
            "ANCHORING" => Some(Self::Anchoring),
            "AVAILABILITY" => Some(Self::Availability),
            "NARRATIVE" => Some(Self::Narrative),
            "HINDSIGHT" => Some(Self::Hindsight),
            "SURVIVORSHIP" => Some(Self::Survivorship),
            _ => None,
        }
    }
}

/// Evidence-quality markers counted against the evidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceQualityMarker {
    Unverified,
    Incomplete,
    Contradicted,
    Unstable,
    Dated,
}

impl EvidenceQualityMarker {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Unverified => "UNVERIFIED",
            Self::Incomplete => "INCOMPLETE",
            Self::Contradicted => "CONTRADICTED",
            Self::Unstable => "UNSTABLE",
            Self::Dated => "DATED",
        }
    }

    pub(crate) fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "UNVERIFIED" => Some(Self::Unverified),
            "INCOMPLETE" => Some(Self::Incomplete),
            "CONTRADICTED" => Some(Self::Contradicted),
            "UNSTABLE" => Some(Self::Unstable),
            "DATED" => Some(Self::Dated),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_order_is_render_order() {
        let mut sorted = SectionKind::ALL;
        sorted.sort();
        assert_eq!(sorted, SectionKind::ALL);
    }

    #[test]
    fn test_semantic_marker_sections() {
        assert_eq!(SemanticMarker::Insight.section(), SectionKind::Insights);
        assert_eq!(SemanticMarker::Branch.section(), SectionKind::Branches);
        assert_eq!(SemanticMarker::from_tag("COUNTER"), Some(SemanticMarker::Counter));
        assert_eq!(SemanticMarker::from_tag("BOGUS"), None);
    }

    #[test]
    fn test_misfit_classification() {
        assert!(DialecticalMarker::TooGranular.is_misfit());
        assert!(DialecticalMarker::TensionMissing.is_misfit());
        assert!(!DialecticalMarker::RightLevel.is_misfit());
        assert!(!DialecticalMarker::Reframe.is_misfit());
    }

    #[test]
    fn test_mode_sensitive_fallacies() {
        assert!(FallacyMarker::Hindsight.is_mode_sensitive());
        assert!(FallacyMarker::Survivorship.is_mode_sensitive());
        assert!(!FallacyMarker::Confirmation.is_mode_sensitive());
    }
}
