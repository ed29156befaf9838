//! Structured working-memory document accumulated across passes.
//!
//! The scratchpad is the single mutable hub of a session: fixed sections of
//! deduplicated items, key-evidence anchors exempt from every compression
//! tier, alternative-thesis branches, and the confidence trajectory. The
//! cycle controller owns it exclusively; in parallel branch mode, branches
//! work on private clones that are merged back at the barrier.

mod pad;
mod proptest;
mod types;

pub use pad::Scratchpad;
pub use types::{
    EvidenceBalance, EvidenceDirection, FinalTrend, KeyEvidence, Section, ThesisBranch,
    TrajectoryAnalysis,
};
