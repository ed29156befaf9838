//! The cycle controller: Pass 0 routing, main cycles, branch sweeps,
//! termination, synthesis.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::claims::Claim;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::oracle::Oracle;
use crate::router::{RouterResult, ThesisRouter};
use crate::scratchpad::{Scratchpad, ThesisBranch, TrajectoryAnalysis};

use super::cancel::CancellationToken;
use super::events::{ProgressEvent, ProgressKind, ProgressSink};
use super::passes::{PassResult, PassRunner};
use super::termination::{check_termination, TerminationReason};

/// Weight of the winning branch in the final blended confidence.
const BRANCH_BLEND: f64 = 0.5;

/// Final result of a harness session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessResult {
    pub session_id: String,
    pub title: String,
    pub passes: Vec<PassResult>,
    pub final_synthesis: String,
    pub final_confidence: f64,
    pub confidence_trajectory: Vec<f64>,
    pub trajectory_analysis: TrajectoryAnalysis,
    pub termination_reason: TerminationReason,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
    pub router: RouterResult,
    pub scratchpad: Scratchpad,
}

/// Multi-pass reasoning harness.
///
/// Owns the oracle, the Pass-0 router, and the session configuration. Each
/// call to [`run`](Harness::run) creates a fresh scratchpad and drives it
/// through N cycles of expansion, compression, and adversarial critique,
/// with optional targeted re-expansion and branch sweeps, ending in one
/// synthesis pass.
pub struct Harness {
    oracle: Arc<dyn Oracle>,
    router: ThesisRouter,
    config: HarnessConfig,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
}

impl Harness {
    pub fn new(oracle: Arc<dyn Oracle>, config: HarnessConfig) -> Self {
        let router = ThesisRouter::new(config.router_budget);
        Self {
            oracle,
            router,
            config,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the default (empty-library) router.
    pub fn with_router(mut self, router: ThesisRouter) -> Self {
        self.router = router;
        self
    }

    /// Stream progress events into a channel.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Token that cancels the session at the next oracle suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, kind: ProgressKind, data: serde_json::Value) {
        if let Some(sink) = &self.progress {
            let _ = sink.send(ProgressEvent::new(kind, data));
        }
    }

    /// Map a pass failure to a termination reason, or bubble it if the
    /// session cannot continue (auth, malformed configuration).
    fn classify_failure(&self, err: Error) -> Result<TerminationReason> {
        match err {
            Error::Cancelled => Ok(TerminationReason::Cancelled),
            Error::RetriesExhausted { .. } | Error::Transport { .. } | Error::Timeout { .. } => {
                self.emit(ProgressKind::Error, json!({ "message": err.to_string() }));
                warn!(error = %err, "pass failed after retries; returning partial result");
                Ok(TerminationReason::TransportError)
            }
            other => Err(other),
        }
    }

    /// Run a full session over the given claims.
    ///
    /// Cancellation and exhausted retries surface as a normal result with
    /// the corresponding termination reason and all completed passes;
    /// unrecoverable errors abort the session.
    pub async fn run(
        &self,
        title: &str,
        claims: &[Claim],
        initial_context: &str,
    ) -> Result<HarnessResult> {
        let started = Instant::now();
        let session_id = format!("harness-{}", Uuid::new_v4().simple());
        info!(session_id = %session_id, title, claims = claims.len(), "harness session start");

        let mut pad = Scratchpad::with_mode(
            session_id.clone(),
            title,
            self.config.analysis_mode,
            self.config.limits,
        );
        for claim in claims {
            pad.add_claim(claim);
        }

        // PASS 0: route against the prior library and assemble context.
        let route = self.router.route(title, claims);
        self.emit(
            ProgressKind::Initialized,
            json!({
                "session_id": session_id.clone(),
                "claims": claims.len(),
                "route_type": route.route_type.to_string(),
                "route_confidence": route.confidence,
                "matched_priors": route.matched_priors.clone(),
                "matched_patterns": route.matched_patterns.clone(),
            }),
        );

        let mut first_expansion_context = route.assembled_context.clone();
        if !initial_context.is_empty() {
            first_expansion_context.push_str("\n\n## Initial Context\n");
            first_expansion_context.push_str(initial_context);
        }

        let runner = PassRunner::new(
            self.oracle.clone(),
            self.config.token_caps,
            self.config.analysis_mode,
            self.cancel.clone(),
        );

        let mut passes: Vec<PassResult> = Vec::new();
        let mut synthesis_text = String::new();
        let termination: TerminationReason;

        macro_rules! try_pass {
            ($expr:expr, $label:lifetime) => {
                match $expr {
                    Ok(output) => output,
                    Err(err) => {
                        termination = self.classify_failure(err)?;
                        break $label;
                    }
                }
            };
        }

        'session: loop {
            pad.increment_cycle();
            let cycle = pad.cycle_count;
            let mut cycle_insights = 0usize;
            self.emit(ProgressKind::CycleStart, json!({ "cycle": cycle }));

            // EXPANSION
            let prior_context = (cycle == 1).then_some(first_expansion_context.as_str());
            let expansion = try_pass!(runner.run_expansion(&mut pad, cycle, prior_context).await, 'session);
            cycle_insights += expansion.result.insights_found;
            self.emit(
                ProgressKind::ExpansionComplete,
                json!({
                    "cycle": cycle,
                    "confidence": expansion.result.confidence,
                    "tokens": expansion.result.tokens_used,
                }),
            );
            passes.push(expansion.result);

            // COMPRESSION
            let compression = try_pass!(runner.run_compression(&mut pad, cycle).await, 'session);
            cycle_insights += compression.result.insights_found;
            self.emit(
                ProgressKind::CompressionComplete,
                json!({
                    "cycle": cycle,
                    "confidence": compression.result.confidence,
                    "tokens": compression.result.tokens_used,
                }),
            );
            passes.push(compression.result);

            // CRITIQUE
            let critique = try_pass!(runner.run_critique(&mut pad, cycle).await, 'session);
            cycle_insights += critique.result.insights_found;
            let major_flaws = critique.result.major_flaws_found;
            self.emit(
                ProgressKind::CritiqueComplete,
                json!({
                    "cycle": cycle,
                    "confidence": critique.result.confidence,
                    "tokens": critique.result.tokens_used,
                    "major_flaws": major_flaws,
                }),
            );
            let critique_extraction = critique.extraction.clone();
            passes.push(critique.result);

            // TARGETED RE-EXPANSION when the critique found enough major
            // flaws. No second critique in the same cycle: re-running it
            // immediately oscillates.
            if major_flaws >= self.config.re_expansion_threshold && cycle < self.config.max_cycles
            {
                self.emit(
                    ProgressKind::ReExpansionTriggered,
                    json!({ "cycle": cycle, "flaws": major_flaws }),
                );
                debug!(cycle, major_flaws, "targeted re-expansion triggered");

                let re_expansion =
                    try_pass!(runner.run_targeted_expansion(&mut pad, cycle, &critique_extraction).await, 'session);
                cycle_insights += re_expansion.result.insights_found;
                self.emit(
                    ProgressKind::ReExpansionComplete,
                    json!({ "cycle": cycle, "insights": re_expansion.result.insights_found }),
                );
                passes.push(re_expansion.result);

                let re_compression = try_pass!(runner.run_compression(&mut pad, cycle).await, 'session);
                cycle_insights += re_compression.result.insights_found;
                passes.push(re_compression.result);
            }

            pad.record_cycle_insights(cycle_insights);

            // BRANCHING
            if pad.should_branch(&self.config.branching) {
                let proposals = pad.branch_proposals();
                self.emit(
                    ProgressKind::BranchingTriggered,
                    json!({
                        "cycle": cycle,
                        "confidence": pad.current_confidence,
                        "proposals": proposals.len(),
                    }),
                );

                let capacity = self
                    .config
                    .branching
                    .max_branches
                    .saturating_sub(pad.active_branches().len());
                for proposal in proposals.into_iter().take(capacity) {
                    let branch = pad.create_branch(proposal);
                    self.emit(
                        ProgressKind::BranchCreated,
                        json!({
                            "branch_id": branch.id,
                            "thesis": truncate(&branch.thesis, 80),
                        }),
                    );
                }
                pad.clear_branch_proposals();

                if let Err(err) = self.run_branch_sweep(&runner, &mut pad, cycle, &mut passes).await
                {
                    termination = self.classify_failure(err)?;
                    break 'session;
                }
            }

            // TERMINATION
            if let Some(reason) =
                check_termination(&pad, &self.config.termination, self.config.max_cycles)
            {
                self.emit(
                    ProgressKind::Terminating,
                    json!({ "reason": reason.to_string(), "cycle_insights": cycle_insights }),
                );
                info!(cycle, reason = %reason, "termination criteria met");

                // FINAL SYNTHESIS with branch-merge guidance.
                let guidance = self.branch_guidance(&pad);
                let synthesis = try_pass!(runner.run_synthesis(&mut pad, &guidance).await, 'session);
                synthesis_text = synthesis.result.content.clone();
                passes.push(synthesis.result);

                termination = reason;
                break 'session;
            }
        }

        let final_confidence = match pad.winning_branch() {
            Some(winning) => {
                BRANCH_BLEND * pad.current_confidence + BRANCH_BLEND * winning.confidence
            }
            None => pad.current_confidence,
        };

        let total_tokens: u64 = passes.iter().map(|p| p.tokens_used).sum();

        Ok(HarnessResult {
            session_id,
            title: title.to_string(),
            passes,
            final_synthesis: synthesis_text,
            final_confidence,
            confidence_trajectory: pad.trajectory().to_vec(),
            trajectory_analysis: pad.analyze_trajectory(),
            termination_reason: termination,
            total_duration_ms: started.elapsed().as_millis() as u64,
            total_tokens,
            router: route,
            scratchpad: pad,
        })
    }

    /// One expansion-compression-critique cycle per active branch.
    ///
    /// Sequential by default. In parallel mode every branch works on a
    /// private clone of the scratchpad; the clones are merged back in branch
    /// order at the barrier.
    async fn run_branch_sweep(
        &self,
        runner: &PassRunner,
        pad: &mut Scratchpad,
        cycle: u32,
        passes: &mut Vec<PassResult>,
    ) -> Result<()> {
        let branches: Vec<ThesisBranch> =
            pad.active_branches().into_iter().cloned().collect();

        if self.config.parallel_branches {
            for branch in &branches {
                self.emit(
                    ProgressKind::BranchCycleStart,
                    json!({ "branch_id": branch.id, "thesis": truncate(&branch.thesis, 50) }),
                );
            }

            let jobs = branches.iter().map(|branch| {
                let mut copy = pad.clone();
                copy.current_branch_id = Some(branch.id.clone());
                let branch = branch.clone();
                async move {
                    let mut local = Vec::new();
                    let expansion = runner.run_branch_expansion(&mut copy, cycle, &branch).await?;
                    local.push(expansion.result);
                    let compression = runner.run_compression(&mut copy, cycle).await?;
                    local.push(compression.result);
                    let critique = runner.run_branch_critique(&mut copy, cycle, &branch).await?;
                    if let Some(confidence) = critique.extraction.declared.conclusion() {
                        copy.set_branch_confidence(&branch.id, confidence);
                    }
                    local.push(critique.result);
                    Ok::<_, Error>((copy, local, branch.id.clone()))
                }
            });

            for outcome in futures::future::join_all(jobs).await {
                let (copy, local, branch_id) = outcome?;
                let confidence = copy
                    .branches
                    .iter()
                    .find(|b| b.id == branch_id)
                    .map(|b| b.confidence)
                    .unwrap_or_default();
                pad.merge_branch_copy(&copy);
                // Sibling copies carry stale snapshots of each other's
                // records, so confidences are written explicitly.
                pad.set_branch_confidence(&branch_id, confidence);
                passes.extend(local);
                self.emit(
                    ProgressKind::BranchCycleComplete,
                    json!({ "branch_id": branch_id, "confidence": confidence }),
                );
            }
        } else {
            for branch in branches {
                pad.current_branch_id = Some(branch.id.clone());
                self.emit(
                    ProgressKind::BranchCycleStart,
                    json!({ "branch_id": branch.id, "thesis": truncate(&branch.thesis, 50) }),
                );

                let expansion = runner.run_branch_expansion(pad, cycle, &branch).await?;
                passes.push(expansion.result);
                let compression = runner.run_compression(pad, cycle).await?;
                passes.push(compression.result);
                let critique = runner.run_branch_critique(pad, cycle, &branch).await?;
                if let Some(confidence) = critique.extraction.declared.conclusion() {
                    pad.set_branch_confidence(&branch.id, confidence);
                }
                passes.push(critique.result);

                let confidence = pad
                    .branches
                    .iter()
                    .find(|b| b.id == branch.id)
                    .map(|b| b.confidence)
                    .unwrap_or_default();
                self.emit(
                    ProgressKind::BranchCycleComplete,
                    json!({ "branch_id": branch.id, "confidence": confidence }),
                );
            }
        }

        pad.current_branch_id = None;
        Ok(())
    }

    /// Branch-merge guidance for the synthesis prompt.
    fn branch_guidance(&self, pad: &Scratchpad) -> String {
        let mut active = pad.active_branches();
        if active.is_empty() {
            return String::new();
        }
        active.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut out = String::from("\n## Active Branches to Merge\n");
        for branch in &active {
            out.push_str(&format!(
                "- **{}** ({:.0}%): {}\n",
                branch.id,
                branch.confidence * 100.0,
                branch.thesis
            ));
        }

        out.push_str("\n## Branch Merge Strategy\n");
        let gap = if active.len() >= 2 {
            active[0].confidence - active[1].confidence
        } else {
            f64::MAX
        };

        if gap > self.config.branching.select_gap {
            out.push_str(&format!(
                "Branch '{}' dominates (confidence gap {:.0}% > {:.0}%): **SELECT** it as the thesis.\n",
                active[0].id,
                gap.min(1.0) * 100.0,
                self.config.branching.select_gap * 100.0,
            ));
        } else {
            out.push_str(
                "Branches are close. Choose ONE of these approaches:\n\
                 1. **CONDITIONAL**: Synthesize as \"Under condition X, thesis A; under condition Y, thesis B\"\n\
                 2. **RECONCILE**: Find the synthesis that accommodates both\n\
                 State your merge approach in the output.\n",
            );
        }
        out
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
