//! Semantic-marker extraction from LLM output.
//!
//! Bracketed tags and a small set of numeric confidence lines are the only
//! machine-consumed structure in oracle output. This module owns all of that
//! parsing: the closed marker vocabularies, the extractor, and the declared
//! score lines. Everything else in the output text is ignored.

mod extract;
mod proptest;
mod types;

pub use extract::{DeclaredScores, Extraction, MarkerExtractor};
pub use types::{
    DialecticalMarker, EvidenceQualityMarker, FallacyMarker, SectionKind, SemanticMarker,
};
