//! Pass execution: prompt composition, oracle invocation, bookkeeping.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::confidence::AnalysisMode;
use crate::config::PassTokenCaps;
use crate::error::{Error, Result};
use crate::markers::{Extraction, MarkerExtractor, SectionKind};
use crate::oracle::Oracle;
use crate::scratchpad::{Scratchpad, ThesisBranch};

use super::cancel::CancellationToken;

/// Six questioning techniques applied by every critique pass.
const SIX_QUESTIONING_TECHNIQUES: &str = "\
## Six Questioning Techniques

1. **INVERSION**: What if the opposite were true?
2. **SECOND-ORDER**: What are the downstream effects?
3. **FALSIFICATION**: What evidence would disprove this?
4. **BASE RATES**: What do historical priors suggest?
5. **INCENTIVE AUDIT**: Who benefits from this being believed?
6. **ADVERSARY SIMULATION**: How would a smart skeptic attack this?
";

/// The pass vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Expansion,
    Compression,
    TargetedExpansion,
    Critique,
    BranchExpansion,
    BranchCritique,
    Synthesis,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Expansion => "expansion",
            Self::Compression => "compression",
            Self::TargetedExpansion => "targeted_expansion",
            Self::Critique => "critique",
            Self::BranchExpansion => "branch_expansion",
            Self::BranchCritique => "branch_critique",
            Self::Synthesis => "synthesis",
        };
        write!(f, "{}", s)
    }
}

/// Result of a single pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassResult {
    pub pass_type: PassKind,
    pub content: String,
    /// Composite confidence after the pass (branch confidence for branch passes)
    pub confidence: f64,
    pub duration_ms: u64,
    pub tokens_used: u64,
    /// Items newly merged into the scratchpad by this pass
    pub insights_found: usize,
    /// Re-expansion trigger score; nonzero only for critique passes
    pub major_flaws_found: u32,
}

/// A pass result together with its parsed extraction, which the controller
/// needs for confidence updates and re-expansion focus.
#[derive(Debug, Clone)]
pub(crate) struct PassOutput {
    pub result: PassResult,
    pub extraction: Extraction,
}

/// Builds one prompt per pass type, invokes the oracle, and feeds the output
/// back into the scratchpad.
pub(crate) struct PassRunner {
    oracle: Arc<dyn Oracle>,
    caps: PassTokenCaps,
    mode: AnalysisMode,
    cancel: CancellationToken,
}

impl PassRunner {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        caps: PassTokenCaps,
        mode: AnalysisMode,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            oracle,
            caps,
            mode,
            cancel,
        }
    }

    /// Invoke the oracle and merge the output. Cancellation is observed at
    /// the call itself, so a cancelled pass leaves the scratchpad untouched.
    async fn run_pass(
        &self,
        pad: &mut Scratchpad,
        kind: PassKind,
        system: String,
        user: String,
        max_output_tokens: u32,
    ) -> Result<PassOutput> {
        let start = Instant::now();

        let reply = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            reply = self.oracle.invoke(&system, &user, max_output_tokens) => reply?,
        };

        let extraction = MarkerExtractor::extract(&reply.text);
        let insights_found = pad.merge_extraction(&extraction);

        Ok(PassOutput {
            result: PassResult {
                pass_type: kind,
                content: reply.text,
                confidence: pad.current_confidence,
                duration_ms: start.elapsed().as_millis() as u64,
                tokens_used: reply.output_tokens,
                insights_found,
                major_flaws_found: 0,
            },
            extraction,
        })
    }

    /// Divergent exploration. The router's assembled context rides along on
    /// the first expansion only.
    pub async fn run_expansion(
        &self,
        pad: &mut Scratchpad,
        cycle: u32,
        prior_context: Option<&str>,
    ) -> Result<PassOutput> {
        let context_block = prior_context
            .map(|ctx| format!("\n## Relevant Context (from Pass 0 Routing)\n{}\n", ctx))
            .unwrap_or_default();

        let system = format!(
            "You are in EXPANSION mode for cycle {cycle}. Think thoroughly and divergently.\n\
             {context_block}\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             ## Your Task\n\
             Expand on the analysis. Mark important elements with these tags:\n\
             - [INSIGHT] - A non-obvious observation worth preserving\n\
             - [EVIDENCE] - A specific data point that supports a claim\n\
             - [RISK] - Something that could undermine the analysis\n\
             - [COUNTER] - A counterargument or alternative interpretation\n\
             - [PATTERN] - A generalizable lesson\n\
             - [QUESTION] - Something that needs validation\n\n\
             Consider:\n\
             - What patterns would a veteran strategist notice?\n\
             - What would competitors argue?\n\
             - What are the second-order effects?\n\
             - What assumptions might be wrong?\n",
            cycle = cycle,
            context_block = context_block,
            scratchpad = pad.render(),
        );
        let user = format!(
            "Cycle {}: Expand on the claims and current analysis. Use semantic markers liberally.",
            cycle
        );

        self.run_pass(pad, PassKind::Expansion, system, user, self.caps.expansion)
            .await
    }

    /// Distill to decision-relevant content, markers preserved.
    pub async fn run_compression(&self, pad: &mut Scratchpad, cycle: u32) -> Result<PassOutput> {
        let system = format!(
            "You are in COMPRESSION mode for cycle {cycle}. Distill to decision-relevant content.\n\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             ## Your Task\n\
             Compress the analysis to its essence:\n\
             1. Preserve ALL content marked with [INSIGHT], [EVIDENCE], [RISK], [COUNTER], [PATTERN]\n\
             2. Drop hedging language (\"it's worth noting\", \"importantly\")\n\
             3. Drop redundant restatements\n\
             4. Preserve specific numbers and data points\n\
             5. Keep semantic markers in your output\n\n\
             Every sentence should earn its place.\n",
            cycle = cycle,
            scratchpad = pad.render(),
        );
        let user = format!(
            "Cycle {}: Compress the accumulated analysis. Preserve marked content.",
            cycle
        );

        self.run_pass(pad, PassKind::Compression, system, user, self.caps.compression)
            .await
    }

    /// Adversarial stress-test. Updates the confidence model and scores the
    /// re-expansion trigger.
    pub async fn run_critique(&self, pad: &mut Scratchpad, cycle: u32) -> Result<PassOutput> {
        let mode_note = match self.mode {
            AnalysisMode::Forward => {
                "This is a FORWARD-LOOKING analysis: hindsight and survivorship reasoning are fallacies.\n\
                 Flag them with [HINDSIGHT] or [SURVIVORSHIP]."
            }
            AnalysisMode::Retrospective => {
                "This is a RETROSPECTIVE case study: hindsight and survivorship observations are\n\
                 valuable. Still tag them with [HINDSIGHT] or [SURVIVORSHIP] so they can be recorded."
            }
        };

        let system = format!(
            "You are an ADVERSARIAL CRITIC for cycle {cycle}.\n\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             {techniques}\n\
             ## Your Task\n\
             Apply ALL six techniques to stress-test the analysis.\n\n\
             Mark substantive findings:\n\
             - [COUNTER] for counterarguments\n\
             - [RISK] for identified risks\n\
             - [QUESTION] for unresolved questions\n\
             - [BRANCH] for a mutually exclusive alternative thesis that cannot be reconciled\n\
               with the current one (e.g. \"bull case\" vs \"bear case\")\n\n\
             Calibrate the reasoning itself:\n\
             - Altitude: [TOO_GRANULAR], [TOO_ABSTRACT], or [RIGHT_LEVEL]\n\
             - Tensions: [TENSION_FOUND], [TENSION_MISSING], or [TENSION_WRONG]\n\
             - Framing: [FRAMEWORK], [NOVEL], [MISAPPLIED], [REFRAME], [ELEVATE]\n\
             - Generality: [TRANSFERABLE], [CASE_SPECIFIC], [UNIVERSAL]\n\n\
             Flag reasoning fallacies with [CONFIRMATION], [ANCHORING], [AVAILABILITY], [NARRATIVE].\n\
             {mode_note}\n\n\
             Flag weak evidence with [UNVERIFIED], [INCOMPLETE], [CONTRADICTED], [UNSTABLE], [DATED].\n\n\
             End with your calibrated scores, one per line:\n\
             REASONING_QUALITY: 0.XX\n\
             EVIDENCE_QUALITY: 0.XX\n\
             CONCLUSION_CONFIDENCE: 0.XX\n\n\
             If you found significant flaws, confidence should DECREASE.\n\
             Non-monotonic trajectories indicate genuine exploration.\n",
            cycle = cycle,
            scratchpad = pad.render(),
            techniques = SIX_QUESTIONING_TECHNIQUES,
            mode_note = mode_note,
        );
        let user = format!(
            "Cycle {}: Apply all six questioning techniques. Be ruthless but fair.",
            cycle
        );

        let mut output = self
            .run_pass(pad, PassKind::Critique, system, user, self.caps.critique)
            .await?;

        pad.apply_critique(&output.extraction);
        output.result.confidence = pad.current_confidence;
        output.result.major_flaws_found = output.extraction.major_flaws_found();
        Ok(output)
    }

    /// Focused follow-up on the flaws a critique surfaced.
    pub async fn run_targeted_expansion(
        &self,
        pad: &mut Scratchpad,
        cycle: u32,
        critique: &Extraction,
    ) -> Result<PassOutput> {
        let mut flaws = String::new();

        let counters: Vec<&str> = critique.items_for(SectionKind::Counters).take(3).collect();
        if !counters.is_empty() {
            flaws.push_str("**Counterarguments to address:**\n");
            for (i, counter) in counters.iter().enumerate() {
                flaws.push_str(&format!("{}. {}\n", i + 1, counter));
            }
        }

        let risks: Vec<&str> = critique.items_for(SectionKind::Risks).take(3).collect();
        if !risks.is_empty() {
            flaws.push_str("\n**Risks to investigate:**\n");
            for (i, risk) in risks.iter().enumerate() {
                flaws.push_str(&format!("{}. {}\n", i + 1, risk));
            }
        }

        let misfits = critique.misfit_items();
        if !misfits.is_empty() {
            flaws.push_str("\n**Reasoning misfits to repair:**\n");
            for (i, misfit) in misfits.iter().take(3).enumerate() {
                flaws.push_str(&format!("{}. {}\n", i + 1, misfit));
            }
        }

        let system = format!(
            "You are in TARGETED RE-EXPANSION mode for cycle {cycle}.\n\n\
             The adversarial critique identified significant flaws that need deeper investigation.\n\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             ## Flaws to Address\n{flaws}\n\
             ## Your Task\n\
             For EACH identified flaw:\n\
             1. Explore whether it invalidates or merely qualifies the thesis\n\
             2. Search for evidence that supports OR refutes the counterargument\n\
             3. Consider if this reveals a more nuanced position\n\n\
             Mark your findings:\n\
             - [INSIGHT] for new understanding\n\
             - [EVIDENCE] for supporting/refuting data\n\
             - [COUNTER] if you find additional challenges\n\
             - [PATTERN] for generalizable lessons\n\n\
             Do NOT dismiss the critique. Either strengthen the thesis against it OR adjust the\n\
             thesis to accommodate it.\n",
            cycle = cycle,
            scratchpad = pad.render(),
            flaws = flaws,
        );
        let user = format!(
            "Cycle {}: Address the critique's major flaws through targeted expansion.",
            cycle
        );

        self.run_pass(
            pad,
            PassKind::TargetedExpansion,
            system,
            user,
            self.caps.targeted_expansion,
        )
        .await
    }

    /// Develop one branch thesis as if it were true.
    pub async fn run_branch_expansion(
        &self,
        pad: &mut Scratchpad,
        cycle: u32,
        branch: &ThesisBranch,
    ) -> Result<PassOutput> {
        let system = format!(
            "You are in BRANCH EXPANSION mode for cycle {cycle}.\n\n\
             ## Branch Context\n\
             **Branch ID**: {id}\n\
             **Branch Thesis**: {thesis}\n\
             **Parent Branch**: {parent}\n\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             ## Your Task\n\
             Explore this specific branch thesis. Assume it is TRUE and develop it:\n\
             - What evidence supports this branch over alternatives?\n\
             - What are the implications if this branch is correct?\n\
             - What conditions must hold for this thesis to be valid?\n\n\
             Mark findings with [INSIGHT], [EVIDENCE], [RISK], [COUNTER], [PATTERN].\n\
             Focus on what differentiates this branch from alternatives.\n",
            cycle = cycle,
            id = branch.id,
            thesis = branch.thesis,
            parent = branch.parent_id.as_deref().unwrap_or("root"),
            scratchpad = pad.render(),
        );
        let user = format!(
            "Expand on branch '{}': {}",
            branch.id,
            truncate(&branch.thesis, 100)
        );

        let mut output = self
            .run_pass(
                pad,
                PassKind::BranchExpansion,
                system,
                user,
                self.caps.branch_expansion,
            )
            .await?;
        output.result.confidence = branch.confidence;
        Ok(output)
    }

    /// Focused critique of one branch. The declared confidence is written to
    /// the branch by the controller, not to the main model.
    pub async fn run_branch_critique(
        &self,
        pad: &mut Scratchpad,
        cycle: u32,
        branch: &ThesisBranch,
    ) -> Result<PassOutput> {
        let system = format!(
            "You are critiquing a specific BRANCH thesis for cycle {cycle}.\n\n\
             ## Branch Context\n\
             **Branch ID**: {id}\n\
             **Branch Thesis**: {thesis}\n\n\
             ## Current Scratchpad\n{scratchpad}\n\n\
             ## Your Task\n\
             Evaluate this specific branch:\n\
             1. What is the strongest argument AGAINST this branch thesis?\n\
             2. What evidence would DISPROVE this branch?\n\
             3. How does this branch compare to alternatives?\n\n\
             Provide your assessment:\n\
             CONFIDENCE: 0.XX (how likely is this branch thesis correct?)\n\n\
             Be calibrated - don't inflate or deflate confidence artificially.\n",
            cycle = cycle,
            id = branch.id,
            thesis = branch.thesis,
            scratchpad = pad.render(),
        );
        let user = format!(
            "Critique branch '{}': {}",
            branch.id,
            truncate(&branch.thesis, 100)
        );

        let mut output = self
            .run_pass(
                pad,
                PassKind::BranchCritique,
                system,
                user,
                self.caps.branch_critique,
            )
            .await?;
        output.result.confidence = branch.confidence;
        Ok(output)
    }

    /// Crystallize the final thesis, merging branches when any are active.
    pub async fn run_synthesis(
        &self,
        pad: &mut Scratchpad,
        branch_guidance: &str,
    ) -> Result<PassOutput> {
        let trajectory = pad
            .trajectory()
            .iter()
            .map(|c| format!("{:.0}%", c * 100.0))
            .collect::<Vec<_>>()
            .join(" → ");
        let analysis = pad.analyze_trajectory();
        let has_branches = !pad.active_branches().is_empty();

        let branch_section = if has_branches {
            "6. **Branch Resolution**: How branches were merged\n"
        } else {
            ""
        };

        let system = format!(
            "You are in FINAL SYNTHESIS mode. Crystallize the analysis into a thesis.\n\n\
             ## Complete Scratchpad\n{scratchpad}\n\n\
             ## Confidence Trajectory\n{trajectory}\n\n\
             ## Trajectory Analysis\n\
             - Is monotonic: {monotonic}\n\
             - Max dip: {dip:.0}%\n\
             - Final trend: {trend}\n\
             {guidance}\n\
             ## Your Task\n\
             Form the final thesis with:\n\n\
             1. **Core Belief**: One testable sentence stating the thesis\n\
             2. **Confidence**: 0.0-1.0 reflecting genuine uncertainty\n\
             3. **Evidence For**: Specific supporting points with @CLAIM references\n\
             4. **Evidence Against**: Acknowledged limitations\n\
             5. **Triggers**: Falsifiable conditions - \"what would change this\"\n\
             {branch_section}\n\
             Output as structured markdown.\n",
            scratchpad = pad.render(),
            trajectory = trajectory,
            monotonic = analysis.is_monotonic,
            dip = analysis.max_dip * 100.0,
            trend = analysis.final_trend,
            guidance = branch_guidance,
            branch_section = branch_section,
        );
        let user = "Synthesize the final thesis from all accumulated analysis.".to_string();

        self.run_pass(pad, PassKind::Synthesis, system, user, self.caps.synthesis)
            .await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleReply;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and replays a fixed reply.
    struct EchoOracle {
        reply: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl EchoOracle {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Oracle for EchoOracle {
        async fn invoke(&self, system: &str, user: &str, _max: u32) -> Result<OracleReply> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(OracleReply {
                text: self.reply.clone(),
                output_tokens: 42,
            })
        }
    }

    fn runner(oracle: Arc<EchoOracle>, mode: AnalysisMode) -> PassRunner {
        PassRunner::new(
            oracle,
            PassTokenCaps::default(),
            mode,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_expansion_merges_markers_and_injects_context() {
        let oracle = Arc::new(EchoOracle::new("[INSIGHT] fresh angle"));
        let runner = runner(oracle.clone(), AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");

        let output = runner
            .run_expansion(&mut pad, 1, Some("PRIOR CONTEXT BLOCK"))
            .await
            .unwrap();

        assert_eq!(output.result.pass_type, PassKind::Expansion);
        assert_eq!(output.result.insights_found, 1);
        assert_eq!(output.result.tokens_used, 42);
        assert_eq!(
            pad.section(SectionKind::Insights).content,
            vec!["fresh angle"]
        );

        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("PRIOR CONTEXT BLOCK"));
        assert!(prompts[0].0.contains("EXPANSION mode"));
    }

    #[tokio::test]
    async fn test_second_expansion_omits_prior_context() {
        let oracle = Arc::new(EchoOracle::new("nothing marked"));
        let runner = runner(oracle.clone(), AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");

        runner.run_expansion(&mut pad, 2, None).await.unwrap();
        let prompts = oracle.prompts.lock().unwrap();
        assert!(!prompts[0].0.contains("Pass 0 Routing"));
    }

    #[tokio::test]
    async fn test_critique_updates_confidence_and_flaws() {
        let oracle = Arc::new(EchoOracle::new(
            "[TOO_GRANULAR] lost altitude [TOO_GRANULAR] again [REFRAME] zoom out\n\
             [COUNTER] the bear case\nCONCLUSION_CONFIDENCE: 0.4",
        ));
        let runner = runner(oracle, AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");

        let output = runner.run_critique(&mut pad, 1).await.unwrap();
        assert_eq!(output.result.major_flaws_found, 5);
        assert_eq!(pad.confidence_history.len(), 1);
        assert_eq!(output.result.confidence, pad.current_confidence);
        // Two misfits drag reasoning to 0.9 - 0.30 = 0.6.
        assert!((pad.confidence_model.reasoning_quality - 0.6).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_branch_critique_does_not_touch_model() {
        let oracle = Arc::new(EchoOracle::new("CONFIDENCE: 0.70"));
        let runner = runner(oracle, AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");
        pad.extract_and_merge("[BRANCH] alt");
        let branch = pad.create_branch("alt").clone();

        let output = runner.run_branch_critique(&mut pad, 1, &branch).await.unwrap();
        assert_eq!(output.extraction.declared.conclusion(), Some(0.70));
        assert!(pad.confidence_history.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_pass_leaves_pad_untouched() {
        let oracle = Arc::new(EchoOracle::new("[INSIGHT] should never land"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = PassRunner::new(
            oracle,
            PassTokenCaps::default(),
            AnalysisMode::Forward,
            cancel,
        );
        let mut pad = Scratchpad::new("s", "t");

        let err = runner.run_expansion(&mut pad, 1, None).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(pad.section(SectionKind::Insights).content.is_empty());
    }

    #[tokio::test]
    async fn test_targeted_expansion_lists_flaws() {
        let critique_text = "[COUNTER] bear case one [COUNTER] bear case two \
                             [RISK] funding risk [TOO_GRANULAR] in the weeds";
        let critique = MarkerExtractor::extract(critique_text);

        let oracle = Arc::new(EchoOracle::new("[INSIGHT] resolved"));
        let runner = runner(oracle.clone(), AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");

        runner
            .run_targeted_expansion(&mut pad, 1, &critique)
            .await
            .unwrap();

        let prompts = oracle.prompts.lock().unwrap();
        let system = &prompts[0].0;
        assert!(system.contains("bear case one"));
        assert!(system.contains("funding risk"));
        assert!(system.contains("in the weeds"));
        assert!(system.contains("TARGETED RE-EXPANSION"));
    }

    #[tokio::test]
    async fn test_synthesis_includes_trajectory_and_guidance() {
        let oracle = Arc::new(EchoOracle::new("## Core Belief\nThe thesis."));
        let runner = runner(oracle.clone(), AnalysisMode::Forward);
        let mut pad = Scratchpad::new("s", "t");
        pad.apply_critique(&MarkerExtractor::extract("CONCLUSION_CONFIDENCE: 0.5"));

        runner
            .run_synthesis(&mut pad, "## Branch Merge Guidance\nSELECT branch-1")
            .await
            .unwrap();

        let prompts = oracle.prompts.lock().unwrap();
        let system = &prompts[0].0;
        assert!(system.contains("FINAL SYNTHESIS"));
        assert!(system.contains("SELECT branch-1"));
        assert!(system.contains("Confidence Trajectory"));
    }
}
