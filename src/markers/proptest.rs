//! Property-based tests for marker extraction against adversarial inputs.
//!
//! The extractor is the only component that consumes raw LLM text, so it has
//! to hold up under malformed input: nested brackets, empty markers, case
//! variants, and tags it has never seen.
