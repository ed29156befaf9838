//! The cycle controller and everything it runs.
//!
//! One cycle is expansion -> compression -> critique, optionally followed by
//! a targeted re-expansion and a branch sweep. The controller owns the
//! scratchpad for the whole session, drives passes through the oracle, and
//! stops when the termination detector fires.

mod cancel;
mod controller;
mod events;
mod passes;
mod termination;

pub use cancel::CancellationToken;
pub use controller::{Harness, HarnessResult};
pub use events::{ProgressEvent, ProgressKind, ProgressSink};
pub use passes::{PassKind, PassResult};
pub use termination::{check_termination, TerminationReason};
