//! # dialectic-core
//!
//! A multi-pass reasoning harness for strategic analysis with large language
//! models. Given claims extracted from source material and a thesis title,
//! the harness drives an LLM through repeated cycles of divergent expansion,
//! anchored compression, and adversarial critique, producing a calibrated
//! thesis with explicit evidence, counterarguments, falsification triggers,
//! and a confidence trajectory.
//!
//! ## Core Components
//!
//! - **Markers**: Parse bracketed semantic tags and numeric confidence lines
//!   out of oracle output
//! - **Scratchpad**: Accumulated working memory with key-evidence anchors
//!   that survive every compression
//! - **Confidence**: Three-dimensional model (reasoning, evidence,
//!   conclusion) with cycle-local recovery
//! - **Router**: Pass-0 classification against a prior-belief library with
//!   token-budget allocation
//! - **Harness**: The cycle controller with branching, targeted
//!   re-expansion, and termination detection
//!
//! ## Example
//!
//! ```rust,ignore
//! use dialectic_core::{
//!     AnthropicOracle, Claim, ClaimKind, Harness, HarnessConfig, OracleConfig,
//! };
//! use std::sync::Arc;
//!
//! let oracle = Arc::new(AnthropicOracle::new(OracleConfig::new(api_key)));
//! let harness = Harness::new(oracle, HarnessConfig::default());
//!
//! let claims = vec![Claim::new(
//!     "CLAIM-1",
//!     ClaimKind::CoreThesis,
//!     "Context graphs are the next infrastructure layer",
//!     "exact source quote",
//! )];
//!
//! let result = harness.run("Context Graphs Analysis", &claims, "").await?;
//! println!("{} ({:.0}%)", result.final_synthesis, result.final_confidence * 100.0);
//! ```

pub mod claims;
pub mod config;
pub mod confidence;
pub mod error;
pub mod harness;
pub mod markers;
pub mod oracle;
pub mod probes;
pub mod router;
pub mod scratchpad;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

// Re-exports for convenience
pub use claims::{Claim, ClaimKind};
pub use config::{
    BranchPolicy, HarnessConfig, PassTokenCaps, RetryPolicy, ScratchpadLimits, TerminationPolicy,
};
pub use confidence::{AnalysisMode, ConfidenceModel, CritiqueUpdate};
pub use error::{Error, Result};
pub use harness::{
    check_termination, CancellationToken, Harness, HarnessResult, PassKind, PassResult,
    ProgressEvent, ProgressKind, ProgressSink, TerminationReason,
};
pub use markers::{
    DeclaredScores, DialecticalMarker, EvidenceQualityMarker, Extraction, FallacyMarker,
    MarkerExtractor, SectionKind, SemanticMarker,
};
pub use oracle::{AnthropicOracle, Oracle, OracleConfig, OracleReply};
pub use probes::{Probe, ProbeEvaluator, ProbeKind, ProbeOutcome, ProbeReport};
pub use router::{Analogue, ContextBudget, PriorLibrary, RouteType, RouterResult, ThesisRouter};
pub use scratchpad::{
    EvidenceBalance, EvidenceDirection, FinalTrend, KeyEvidence, Scratchpad, Section,
    ThesisBranch, TrajectoryAnalysis,
};
pub use session::{SessionStore, StoredSession};
