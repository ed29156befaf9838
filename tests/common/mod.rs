//! Shared scripted oracle for end-to-end harness scenarios.

// Not every scenario uses every pass-kind helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use dialectic_core::{Oracle, OracleReply, Result};

/// Pass kinds inferred from the system prompt, used to key scripted replies.
pub const EXPANSION: &str = "expansion";
pub const COMPRESSION: &str = "compression";
pub const TARGETED: &str = "targeted_expansion";
pub const CRITIQUE: &str = "critique";
pub const BRANCH_EXPANSION: &str = "branch_expansion";
pub const BRANCH_CRITIQUE: &str = "branch_critique";
pub const SYNTHESIS: &str = "synthesis";

fn kind_of(system: &str) -> &'static str {
    if system.contains("TARGETED RE-EXPANSION") {
        TARGETED
    } else if system.contains("BRANCH EXPANSION") {
        BRANCH_EXPANSION
    } else if system.contains("critiquing a specific BRANCH") {
        BRANCH_CRITIQUE
    } else if system.contains("ADVERSARIAL CRITIC") {
        CRITIQUE
    } else if system.contains("COMPRESSION mode") {
        COMPRESSION
    } else if system.contains("FINAL SYNTHESIS") {
        SYNTHESIS
    } else if system.contains("EXPANSION mode") {
        EXPANSION
    } else {
        "other"
    }
}

fn default_reply(kind: &str) -> String {
    match kind {
        CRITIQUE => "CONCLUSION_CONFIDENCE: 0.60".to_string(),
        BRANCH_CRITIQUE => "CONFIDENCE: 0.50".to_string(),
        SYNTHESIS => "## Core Belief\nDefault synthesis.".to_string(),
        _ => "no marked findings".to_string(),
    }
}

/// Replays scripted replies per pass kind, recording every call.
///
/// Keyed replies (matched against the system prompt) take precedence over
/// the per-kind queues, which keeps branch-cycle scripts deterministic even
/// when branches run concurrently.
#[derive(Default)]
pub struct ScriptedOracle {
    queues: Mutex<HashMap<&'static str, VecDeque<String>>>,
    keyed: Mutex<Vec<(&'static str, String, String)>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next pass of the given kind.
    pub fn push(&self, kind: &'static str, reply: &str) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(reply.to_string());
    }

    /// Reply with `reply` whenever a pass of `kind` has a system prompt
    /// containing `needle`.
    pub fn push_keyed(&self, kind: &'static str, needle: &str, reply: &str) {
        self.keyed
            .lock()
            .unwrap()
            .push((kind, needle.to_string(), reply.to_string()));
    }

    /// (kind, system prompt) per call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(k, _)| k == kind).count()
    }

    /// System prompts seen for a pass kind.
    pub fn systems_for(&self, kind: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn invoke(&self, system: &str, _user: &str, _max: u32) -> Result<OracleReply> {
        let kind = kind_of(system);
        self.calls
            .lock()
            .unwrap()
            .push((kind.to_string(), system.to_string()));

        let keyed_reply = self
            .keyed
            .lock()
            .unwrap()
            .iter()
            .find(|(keyed_kind, needle, _)| *keyed_kind == kind && system.contains(needle.as_str()))
            .map(|(_, _, reply)| reply.clone());

        let text = keyed_reply.unwrap_or_else(|| {
            self.queues
                .lock()
                .unwrap()
                .get_mut(kind)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| default_reply(kind))
        });

        Ok(OracleReply {
            text,
            output_tokens: 25,
        })
    }
}
