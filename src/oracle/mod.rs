//! The LLM oracle: an opaque request/response transport.
//!
//! The harness only needs one operation: send a system prompt and a user
//! prompt, get back text (with bracketed markers preserved verbatim) and an
//! output-token count. Everything else - provider choice, retries, backoff -
//! stays behind the [`Oracle`] trait so tests can script replies.

mod client;

pub use client::{AnthropicOracle, Oracle, OracleConfig, OracleReply};
