//! HTTP/WebSocket session API.
//!
//! Exposes the harness over three endpoints plus a health check:
//! `POST /ingest` turns a URL or raw text into claims, `POST /harness/run`
//! runs a full session, and `WS /ws/harness` streams progress events while a
//! session runs. Requires the `server` cargo feature.

mod ingest;
mod routes;
mod types;

pub use ingest::{extract_claims, fetch_url};
pub use routes::{router, serve, AppState};
pub use types::{
    HarnessRequest, HarnessResponse, IngestRequest, IngestResponse, PassSummary, RouterInfo,
};
