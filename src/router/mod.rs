//! Pass 0: thesis routing and context-budget allocation.
//!
//! Before the first expansion, the router classifies the query against a
//! library of prior beliefs and reusable analytical frameworks, splits the
//! total context budget accordingly, and assembles the prior-context block
//! that is injected verbatim into the first expansion prompt. An empty
//! library is fine: everything routes NET_NEW.

mod library;
mod route;
mod types;

pub use library::{Analogue, PriorLibrary, ThesisPrior};
pub use route::ThesisRouter;
pub use types::{ContextBudget, RouteType, RouterResult};
