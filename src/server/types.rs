//! Wire types for the session API.

use serde::{Deserialize, Serialize};

use crate::claims::Claim;
use crate::harness::{HarnessResult, TerminationReason};
use crate::router::{ContextBudget, RouteType, RouterResult};
use crate::scratchpad::TrajectoryAnalysis;

fn default_max_cycles() -> u32 {
    5
}

/// `POST /ingest` request body. One of `url` or `text` is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    pub url: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub api_key: Option<String>,
}

/// `POST /ingest` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub session_id: String,
    pub title: String,
    pub text: String,
    pub claims: Vec<Claim>,
}

/// `POST /harness/run` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessRequest {
    pub title: String,
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub initial_context: String,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    pub api_key: Option<String>,
}

/// Pass-0 routing summary included in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterInfo {
    pub route_type: RouteType,
    pub confidence: f64,
    pub reasoning: String,
    pub matched_priors: Vec<String>,
    pub matched_patterns: Vec<String>,
    pub budget: ContextBudget,
}

impl From<&RouterResult> for RouterInfo {
    fn from(result: &RouterResult) -> Self {
        Self {
            route_type: result.route_type,
            confidence: result.confidence,
            reasoning: result.reasoning.clone(),
            matched_priors: result.matched_priors.clone(),
            matched_patterns: result.matched_patterns.clone(),
            budget: result.budget,
        }
    }
}

/// Per-pass summary (full pass content stays server-side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass_type: String,
    pub confidence: f64,
    pub duration_ms: u64,
    pub tokens_used: u64,
    pub insights_found: usize,
    pub major_flaws_found: u32,
}

/// `POST /harness/run` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessResponse {
    pub session_id: String,
    pub title: String,
    pub final_synthesis: String,
    pub final_confidence: f64,
    pub confidence_trajectory: Vec<f64>,
    pub trajectory_analysis: TrajectoryAnalysis,
    pub termination_reason: TerminationReason,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
    pub passes: Vec<PassSummary>,
    pub scratchpad_rendered: String,
    pub router_info: RouterInfo,
}

impl From<&HarnessResult> for HarnessResponse {
    fn from(result: &HarnessResult) -> Self {
        Self {
            session_id: result.session_id.clone(),
            title: result.title.clone(),
            final_synthesis: result.final_synthesis.clone(),
            final_confidence: result.final_confidence,
            confidence_trajectory: result.confidence_trajectory.clone(),
            trajectory_analysis: result.trajectory_analysis,
            termination_reason: result.termination_reason,
            total_duration_ms: result.total_duration_ms,
            total_tokens: result.total_tokens,
            passes: result
                .passes
                .iter()
                .map(|p| PassSummary {
                    pass_type: p.pass_type.to_string(),
                    confidence: p.confidence,
                    duration_ms: p.duration_ms,
                    tokens_used: p.tokens_used,
                    insights_found: p.insights_found,
                    major_flaws_found: p.major_flaws_found,
                })
                .collect(),
            scratchpad_rendered: result.scratchpad.render(),
            router_info: RouterInfo::from(&result.router),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_request_defaults() {
        let req: HarnessRequest =
            serde_json::from_str(r#"{"title": "T", "claims": []}"#).unwrap();
        assert_eq!(req.max_cycles, 5);
        assert!(req.initial_context.is_empty());
        assert!(req.api_key.is_none());
    }

    #[test]
    fn test_ingest_request_accepts_either_source() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"text": "body", "title": "T"}"#).unwrap();
        assert_eq!(req.text.as_deref(), Some("body"));
        assert!(req.url.is_none());
    }
}
