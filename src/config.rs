//! Harness configuration.
//!
//! Every tunable the controller, scratchpad, and termination detector consult
//! lives on one record: compression thresholds, branch policy, termination
//! thresholds, retry schedule, and per-pass output caps.

use serde::{Deserialize, Serialize};

use crate::confidence::AnalysisMode;

/// Scratchpad size limits and two-tier compression thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadLimits {
    /// Soft token cap on the rendered section content (estimator: chars / 4)
    pub max_tokens: usize,
    /// Items kept per volatile section in tier-1 compression
    pub volatile_keep: usize,
    /// Items kept per preserved section in tier-2 compression
    pub preserved_keep: usize,
}

impl Default for ScratchpadLimits {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            volatile_keep: 5,
            preserved_keep: 10,
        }
    }
}

/// When and how many alternative-thesis branches may be opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BranchPolicy {
    /// Composite confidence below which branching is considered
    pub confidence_threshold: f64,
    /// Maximum simultaneously active branches
    pub max_branches: usize,
    /// Minimum completed main cycles before branching
    pub min_cycles: u32,
    /// Confidence gap above which synthesis selects the winning branch outright
    pub select_gap: f64,
}

impl Default for BranchPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            max_branches: 3,
            min_cycles: 2,
            select_gap: 0.20,
        }
    }
}

/// Termination detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminationPolicy {
    /// Pairwise confidence delta below which the trajectory counts as flat
    pub saturation_delta: f64,
    /// Confidence-history points examined for saturation
    pub saturation_window: usize,
    /// New-insight ratio below which returns are diminishing
    pub insight_ratio: f64,
    /// Composite confidence treated as high
    pub high_confidence: f64,
    /// Open-question count below which a high-confidence state is stable
    pub max_open_questions: usize,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            saturation_delta: 0.05,
            saturation_window: 3,
            insight_ratio: 0.5,
            high_confidence: 0.75,
            max_open_questions: 2,
        }
    }
}

/// Retry schedule for oracle calls.
///
/// Backoff is exponential: `2^attempt * base_delay_secs` seconds between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    /// Transport-level timeout per attempt
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            timeout_secs: 120,
        }
    }
}

/// Max-output-token caps per pass type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassTokenCaps {
    pub expansion: u32,
    pub compression: u32,
    pub targeted_expansion: u32,
    pub critique: u32,
    pub branch_expansion: u32,
    pub branch_critique: u32,
    pub synthesis: u32,
}

impl Default for PassTokenCaps {
    fn default() -> Self {
        Self {
            expansion: 4000,
            compression: 2000,
            targeted_expansion: 3000,
            critique: 3000,
            branch_expansion: 2500,
            branch_critique: 1500,
            synthesis: 2500,
        }
    }
}

/// Full configuration for a harness session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Hard cap on main cycles
    pub max_cycles: u32,
    /// Major-flaw score at which targeted re-expansion triggers
    pub re_expansion_threshold: u32,
    /// Forward analysis vs retrospective case study
    pub analysis_mode: AnalysisMode,
    /// Total token budget split by the router
    pub router_budget: usize,
    /// Run branch cycles concurrently on private scratchpad copies
    pub parallel_branches: bool,
    pub limits: ScratchpadLimits,
    pub branching: BranchPolicy,
    pub termination: TerminationPolicy,
    pub retry: RetryPolicy,
    pub token_caps: PassTokenCaps,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_cycles: 5,
            re_expansion_threshold: 3,
            analysis_mode: AnalysisMode::Forward,
            router_budget: 8000,
            parallel_branches: false,
            limits: ScratchpadLimits::default(),
            branching: BranchPolicy::default(),
            termination: TerminationPolicy::default(),
            retry: RetryPolicy::default(),
            token_caps: PassTokenCaps::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of main cycles.
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Set the analysis mode.
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.analysis_mode = mode;
        self
    }

    /// Enable concurrent branch cycles.
    pub fn with_parallel_branches(mut self, parallel: bool) -> Self {
        self.parallel_branches = parallel;
        self
    }

    /// Override the scratchpad limits.
    pub fn with_limits(mut self, limits: ScratchpadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override the branch policy.
    pub fn with_branching(mut self, branching: BranchPolicy) -> Self {
        self.branching = branching;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.max_cycles, 5);
        assert_eq!(config.re_expansion_threshold, 3);
        assert_eq!(config.limits.max_tokens, 8000);
        assert_eq!(config.limits.volatile_keep, 5);
        assert_eq!(config.limits.preserved_keep, 10);
        assert_eq!(config.branching.max_branches, 3);
        assert!(!config.parallel_branches);
    }

    #[test]
    fn test_builder() {
        let config = HarnessConfig::new()
            .with_max_cycles(3)
            .with_mode(AnalysisMode::Retrospective)
            .with_parallel_branches(true);

        assert_eq!(config.max_cycles, 3);
        assert_eq!(config.analysis_mode, AnalysisMode::Retrospective);
        assert!(config.parallel_branches);
    }

    #[test]
    fn test_termination_defaults() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.saturation_window, 3);
        assert!((policy.saturation_delta - 0.05).abs() < f64::EPSILON);
        assert!((policy.insight_ratio - 0.5).abs() < f64::EPSILON);
    }
}
