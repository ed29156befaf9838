//! Property-based tests for scratchpad invariants.
//!
//! These cover the load-bearing guarantees: key evidence survives any
//! sequence of merges and compressions byte-identical and in order, sections
//! never hold duplicates, the composite stays the arithmetic mean, and
//! serialization round-trips every reachable state.
