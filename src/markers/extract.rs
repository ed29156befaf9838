//! Marker and numeric-line extraction from oracle output.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::types::{
    DialecticalMarker, EvidenceQualityMarker, FallacyMarker, SectionKind, SemanticMarker,
};

/// Any bracketed tag plus its content, which runs up to the next opening
/// bracket or end of text.
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([A-Z_]+)\]([^\[]*)").expect("Invalid regex")
});

static REASONING_QUALITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\S\r\n]*REASONING_QUALITY:\s*(\d+(?:\.\d+)?)").expect("Invalid regex")
});

static EVIDENCE_QUALITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\S\r\n]*EVIDENCE_QUALITY:\s*(\d+(?:\.\d+)?)").expect("Invalid regex")
});

static CONCLUSION_CONFIDENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\S\r\n]*CONCLUSION_CONFIDENCE:\s*(\d+(?:\.\d+)?)")
        .expect("Invalid regex")
});

/// Legacy single-score declaration. Line-anchored so it does not fire inside
/// a CONCLUSION_CONFIDENCE line.
static LEGACY_CONFIDENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\S\r\n]*CONFIDENCE:\s*(\d+(?:\.\d+)?)").expect("Invalid regex")
});

/// Numeric score declarations parsed from a critique pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeclaredScores {
    pub reasoning_quality: Option<f64>,
    pub evidence_quality: Option<f64>,
    pub conclusion_confidence: Option<f64>,
    /// Legacy `CONFIDENCE: 0.XX` fallback
    pub legacy_confidence: Option<f64>,
}

impl DeclaredScores {
    /// Conclusion declaration, falling back to the legacy single score.
    pub fn conclusion(&self) -> Option<f64> {
        self.conclusion_confidence.or(self.legacy_confidence)
    }
}

/// Everything recognized in one pass of oracle output.
///
/// Semantic items are deduplicated by content equality within the pass;
/// dialectical, fallacy, and evidence-quality markers keep every occurrence
/// because the confidence rules count repetitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// (target section, trimmed content), insertion order preserved
    pub semantic: Vec<(SectionKind, String)>,
    /// Dialectical markers with their trailing content
    pub dialectical: Vec<(DialecticalMarker, String)>,
    pub fallacies: Vec<FallacyMarker>,
    pub evidence_quality: Vec<EvidenceQualityMarker>,
    pub declared: DeclaredScores,
}

impl Extraction {
    /// Items destined for a given section.
    pub fn items_for(&self, section: SectionKind) -> impl Iterator<Item = &str> {
        self.semantic
            .iter()
            .filter(move |(kind, _)| *kind == section)
            .map(|(_, content)| content.as_str())
    }

    /// Count of dialectical misfit markers.
    pub fn misfit_count(&self) -> usize {
        self.dialectical.iter().filter(|(m, _)| m.is_misfit()).count()
    }

    /// Dialectical misfit contents, for targeted re-expansion focus.
    pub fn misfit_items(&self) -> Vec<&str> {
        self.dialectical
            .iter()
            .filter(|(m, content)| m.is_misfit() && !content.is_empty())
            .map(|(_, content)| content.as_str())
            .collect()
    }

    fn dialectical_count(&self, marker: DialecticalMarker) -> u32 {
        self.dialectical.iter().filter(|(m, _)| *m == marker).count() as u32
    }

    /// Re-expansion trigger score for a critique pass:
    /// `2*TOO_GRANULAR + 2*TENSION_MISSING + TENSION_WRONG + REFRAME + ELEVATE`.
    pub fn major_flaws_found(&self) -> u32 {
        2 * self.dialectical_count(DialecticalMarker::TooGranular)
            + 2 * self.dialectical_count(DialecticalMarker::TensionMissing)
            + self.dialectical_count(DialecticalMarker::TensionWrong)
            + self.dialectical_count(DialecticalMarker::Reframe)
            + self.dialectical_count(DialecticalMarker::Elevate)
    }
}

/// Parses oracle output for bracketed markers and numeric declarations.
pub struct MarkerExtractor;

impl MarkerExtractor {
    /// Extract all recognized structure from one pass of output text.
    pub fn extract(text: &str) -> Extraction {
        let mut extraction = Extraction::default();
        let mut seen: HashSet<(SectionKind, String)> = HashSet::new();

        for caps in MARKER_PATTERN.captures_iter(text) {
            let tag = caps[1].to_ascii_uppercase();
            let content = caps[2].trim().to_string();

            if let Some(marker) = SemanticMarker::from_tag(&tag) {
                if content.is_empty() {
                    continue;
                }
                let key = (marker.section(), content.clone());
                if seen.insert(key) {
                    extraction.semantic.push((marker.section(), content));
                }
            } else if let Some(marker) = DialecticalMarker::from_tag(&tag) {
                extraction.dialectical.push((marker, content));
            } else if let Some(marker) = FallacyMarker::from_tag(&tag) {
                extraction.fallacies.push(marker);
            } else if let Some(marker) = EvidenceQualityMarker::from_tag(&tag) {
                extraction.evidence_quality.push(marker);
            }
            // Unknown tags are ignored: the harness extracts what it
            // recognizes and skips the rest.
        }

        extraction.declared = Self::extract_scores(text);
        extraction
    }

    /// Parse the numeric declaration lines only.
    pub fn extract_scores(text: &str) -> DeclaredScores {
        DeclaredScores {
            reasoning_quality: capture_score(&REASONING_QUALITY_PATTERN, text),
            evidence_quality: capture_score(&EVIDENCE_QUALITY_PATTERN, text),
            conclusion_confidence: capture_score(&CONCLUSION_CONFIDENCE_PATTERN, text),
            legacy_confidence: capture_score(&LEGACY_CONFIDENCE_PATTERN, text),
        }
    }
}

fn capture_score(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semantic_extraction_and_targets() {
        let text = "Preamble.\n[INSIGHT] margins compress first\n[EVIDENCE] Q3 margin fell 400bps\n[RISK] regulatory delay";
        let extraction = MarkerExtractor::extract(text);

        assert_eq!(
            extraction.semantic,
            vec![
                (SectionKind::Insights, "margins compress first".to_string()),
                (SectionKind::Evidence, "Q3 margin fell 400bps".to_string()),
                (SectionKind::Risks, "regulatory delay".to_string()),
            ]
        );
    }

    #[test]
    fn test_content_stops_at_next_bracket() {
        let text = "[INSIGHT] first point [COUNTER] second point";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(
            extraction.semantic,
            vec![
                (SectionKind::Insights, "first point".to_string()),
                (SectionKind::Counters, "second point".to_string()),
            ]
        );
    }

    #[test]
    fn test_multiline_content() {
        let text = "[PATTERN] platform shifts\nfollow capex cycles\n\nno tag here";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(extraction.semantic.len(), 1);
        assert!(extraction.semantic[0].1.contains("capex cycles"));
        assert!(extraction.semantic[0].1.contains("no tag here"));
    }

    #[test]
    fn test_case_insensitive_tags() {
        let text = "[insight] lower case\n[Risk] mixed case";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(extraction.semantic.len(), 2);
        assert_eq!(extraction.semantic[0].0, SectionKind::Insights);
        assert_eq!(extraction.semantic[1].0, SectionKind::Risks);
    }

    #[test]
    fn test_empty_markers_skipped() {
        let text = "[INSIGHT][EVIDENCE]   \n[COUNTER] real content";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(
            extraction.semantic,
            vec![(SectionKind::Counters, "real content".to_string())]
        );
    }

    #[test]
    fn test_duplicates_deduped_within_pass() {
        let text = "[INSIGHT] same point\nfiller\n[INSIGHT] same point";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(extraction.semantic.len(), 1);
    }

    #[test]
    fn test_dialectical_and_fallacy_counts_keep_repeats() {
        let text = "[TOO_GRANULAR] lost the plot [TOO_GRANULAR] again [REFRAME] zoom out \
                    [CONFIRMATION] echo chamber [UNVERIFIED] single source";
        let extraction = MarkerExtractor::extract(text);

        assert_eq!(extraction.misfit_count(), 2);
        assert_eq!(extraction.major_flaws_found(), 5);
        assert_eq!(extraction.fallacies, vec![FallacyMarker::Confirmation]);
        assert_eq!(
            extraction.evidence_quality,
            vec![EvidenceQualityMarker::Unverified]
        );
    }

    #[test]
    fn test_unknown_tags_ignored() {
        let text = "[WHATEVER] noise [INSIGHT] signal";
        let extraction = MarkerExtractor::extract(text);
        assert_eq!(
            extraction.semantic,
            vec![(SectionKind::Insights, "signal".to_string())]
        );
    }

    #[test]
    fn test_declared_triple() {
        let text = "critique...\nREASONING_QUALITY: 0.6\nEVIDENCE_QUALITY: 0.7\nCONCLUSION_CONFIDENCE: 0.55\n";
        let scores = MarkerExtractor::extract_scores(text);
        assert_eq!(scores.reasoning_quality, Some(0.6));
        assert_eq!(scores.evidence_quality, Some(0.7));
        assert_eq!(scores.conclusion_confidence, Some(0.55));
        assert_eq!(scores.conclusion(), Some(0.55));
    }

    #[test]
    fn test_legacy_confidence_line() {
        let scores = MarkerExtractor::extract_scores("CONFIDENCE: 0.72 (still plausible)");
        assert_eq!(scores.legacy_confidence, Some(0.72));
        assert_eq!(scores.conclusion(), Some(0.72));
    }

    #[test]
    fn test_legacy_does_not_match_conclusion_line() {
        let scores = MarkerExtractor::extract_scores("CONCLUSION_CONFIDENCE: 0.9");
        assert_eq!(scores.conclusion_confidence, Some(0.9));
        assert_eq!(scores.legacy_confidence, None);
    }

    #[test]
    fn test_scores_clamped() {
        let scores = MarkerExtractor::extract_scores("CONFIDENCE: 3.5");
        assert_eq!(scores.legacy_confidence, Some(1.0));
    }
}
