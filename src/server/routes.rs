//! Endpoint handlers and the axum router.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::claims::Claim;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::harness::{Harness, TerminationReason};
use crate::oracle::{AnthropicOracle, Oracle, OracleConfig};
use crate::session::{SessionStore, StoredSession};

use super::ingest::{extract_claims, fetch_url};
use super::types::{HarnessRequest, HarnessResponse, IngestRequest, IngestResponse};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    /// Process-wide API key fallback
    api_key: Option<String>,
    /// Transport override, mainly for embedding and tests
    oracle_override: Option<Arc<dyn Oracle>>,
}

impl AppState {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            api_key: None,
            oracle_override: None,
        }
    }

    /// Read the process-wide API key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            store: SessionStore::new(),
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            oracle_override: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a custom oracle instead of building an Anthropic client per
    /// request.
    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle_override = Some(oracle);
        self
    }

    /// Resolve the oracle for a request: the override if set, otherwise an
    /// Anthropic client keyed by the request or the process-wide secret.
    fn oracle_for(&self, request_key: Option<&str>) -> Result<Arc<dyn Oracle>> {
        if let Some(oracle) = &self.oracle_override {
            return Ok(oracle.clone());
        }
        let key = request_key
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                Error::Config(
                    "API key required (pass api_key or set ANTHROPIC_API_KEY)".to_string(),
                )
            })?;
        Ok(Arc::new(AnthropicOracle::new(OracleConfig::new(key))))
    }
}

/// Error envelope for HTTP responses.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Config(_) | Error::Ingest(_) | Error::ClaimExtraction(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Api { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
            Error::RetriesExhausted { .. }
            | Error::Transport { .. }
            | Error::Timeout { .. }
            | Error::Api { .. } => StatusCode::BAD_GATEWAY,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Build the session-API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/harness/run", post(run_harness))
        .route("/ws/harness", get(ws_harness))
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("bind {} failed: {}", addr, e)))?;
    info!(addr, "session API listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Internal(e.to_string()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> std::result::Result<Json<IngestResponse>, ApiError> {
    let oracle = state.oracle_for(request.api_key.as_deref())?;

    let (text, title) = if let Some(url) = &request.url {
        let (text, fetched_title) = fetch_url(url).await?;
        (text, request.title.clone().unwrap_or(fetched_title))
    } else if let Some(text) = &request.text {
        (
            text.clone(),
            request.title.clone().unwrap_or_else(|| "Pasted Content".to_string()),
        )
    } else {
        return Err(Error::Ingest("url or text required".to_string()).into());
    };

    let claims = extract_claims(oracle.as_ref(), &text, &title).await?;
    let session_id = format!("ingest-{}", Uuid::new_v4().simple());

    Ok(Json(IngestResponse {
        session_id,
        title,
        text,
        claims,
    }))
}

async fn run_harness(
    State(state): State<AppState>,
    Json(request): Json<HarnessRequest>,
) -> std::result::Result<Json<HarnessResponse>, ApiError> {
    let oracle = state.oracle_for(request.api_key.as_deref())?;
    let config = HarnessConfig::new().with_max_cycles(request.max_cycles);
    let harness = Harness::new(oracle, config);

    let result = harness
        .run(&request.title, &request.claims, &request.initial_context)
        .await?;

    if result.termination_reason == TerminationReason::TransportError {
        return Err(ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: "oracle failure after retries".to_string(),
        });
    }

    let response = HarnessResponse::from(&result);
    state
        .store
        .insert(StoredSession {
            scratchpad: result.scratchpad.clone(),
            result: Some(result),
        })
        .await;

    Ok(Json(response))
}

async fn ws_harness(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
struct WsCommand {
    action: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default)]
    initial_context: Option<String>,
    #[serde(default)]
    max_cycles: Option<u32>,
    #[serde(default)]
    api_key: Option<String>,
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let command: WsCommand = match serde_json::from_str(text.as_str()) {
            Ok(command) => command,
            Err(e) => {
                if !send_json(&mut socket, &json!({ "event": "error", "data": { "message": e.to_string() } })).await {
                    return;
                }
                continue;
            }
        };

        match command.action.as_str() {
            "ping" => {
                if !send_json(&mut socket, &json!({ "event": "pong" })).await {
                    return;
                }
            }
            "run" => {
                if !run_streaming(&mut socket, &state, command).await {
                    return;
                }
            }
            other => {
                let payload =
                    json!({ "event": "error", "data": { "message": format!("unknown action: {}", other) } });
                if !send_json(&mut socket, &payload).await {
                    return;
                }
            }
        }
    }
}

/// Run one harness session, streaming progress events. Returns false when
/// the socket is gone.
async fn run_streaming(socket: &mut WebSocket, state: &AppState, command: WsCommand) -> bool {
    let oracle = match state.oracle_for(command.api_key.as_deref()) {
        Ok(oracle) => oracle,
        Err(e) => {
            return send_json(
                socket,
                &json!({ "event": "error", "data": { "message": e.to_string() } }),
            )
            .await;
        }
    };

    let title = command.title.unwrap_or_else(|| "Untitled".to_string());
    let initial_context = command.initial_context.unwrap_or_default();
    let config = HarnessConfig::new().with_max_cycles(command.max_cycles.unwrap_or(5));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let harness = Harness::new(oracle, config).with_progress(tx);

    let mut run = Box::pin(harness.run(&title, &command.claims, &initial_context));
    let outcome = loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let payload = serde_json::to_value(&event).unwrap_or_default();
                if !send_json(socket, &payload).await {
                    return false;
                }
            }
            result = &mut run => break result,
        }
    };

    // Flush events emitted right before completion.
    while let Ok(event) = rx.try_recv() {
        let payload = serde_json::to_value(&event).unwrap_or_default();
        if !send_json(socket, &payload).await {
            return false;
        }
    }

    match outcome {
        Ok(result) => {
            let response = HarnessResponse::from(&result);
            state
                .store
                .insert(StoredSession {
                    scratchpad: result.scratchpad.clone(),
                    result: Some(result),
                })
                .await;
            send_json(socket, &json!({ "event": "complete", "data": response })).await
        }
        Err(e) => {
            warn!(error = %e, "streaming session aborted");
            send_json(
                socket,
                &json!({ "event": "error", "data": { "message": e.to_string() } }),
            )
            .await
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text.into())).await.is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimKind;
    use crate::oracle::OracleReply;
    use async_trait::async_trait;

    struct CannedOracle;

    #[async_trait]
    impl Oracle for CannedOracle {
        async fn invoke(&self, system: &str, _user: &str, _max: u32) -> Result<OracleReply> {
            let text = if system.contains("Extract 3-7 key claims") {
                r#"[{"id": "CLAIM-1", "text": "A claim", "type": "core_thesis", "snippet": "quote"}]"#
                    .to_string()
            } else if system.contains("ADVERSARIAL CRITIC") {
                "CONCLUSION_CONFIDENCE: 0.8".to_string()
            } else {
                "[INSIGHT] something".to_string()
            };
            Ok(OracleReply {
                text,
                output_tokens: 5,
            })
        }
    }

    fn test_state() -> AppState {
        AppState::new(SessionStore::new()).with_oracle(Arc::new(CannedOracle))
    }

    #[tokio::test]
    async fn test_missing_api_key_is_bad_request() {
        let state = AppState::new(SessionStore::new());
        let err = state.oracle_for(None).unwrap_err();
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_requires_url_or_text() {
        let state = test_state();
        let response = ingest(State(state), Json(IngestRequest::default())).await;
        let err = response.err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_from_text() {
        let state = test_state();
        let request = IngestRequest {
            text: Some("The source material with a quote inside".to_string()),
            title: Some("My Doc".to_string()),
            ..IngestRequest::default()
        };
        let Json(response) = ingest(State(state), Json(request)).await.unwrap();
        assert_eq!(response.title, "My Doc");
        assert_eq!(response.claims.len(), 1);
        assert!(response.session_id.starts_with("ingest-"));
    }

    #[tokio::test]
    async fn test_run_harness_stores_session() {
        let state = test_state();
        let request = HarnessRequest {
            title: "T".to_string(),
            claims: vec![Claim::new("CLAIM-1", ClaimKind::CoreThesis, "c", "q")],
            initial_context: String::new(),
            max_cycles: 1,
            api_key: None,
        };
        let Json(response) = run_harness(State(state.clone()), Json(request))
            .await
            .unwrap();

        assert_eq!(response.termination_reason, TerminationReason::MaxCyclesReached);
        assert!(!response.scratchpad_rendered.is_empty());
        assert!(state.store.get(&response.session_id).await.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_bad_gateway() {
        struct DeadOracle;
        #[async_trait]
        impl Oracle for DeadOracle {
            async fn invoke(&self, _s: &str, _u: &str, _m: u32) -> Result<OracleReply> {
                Err(Error::retries_exhausted(3, "unreachable"))
            }
        }

        let state = AppState::new(SessionStore::new()).with_oracle(Arc::new(DeadOracle));
        let request = HarnessRequest {
            title: "T".to_string(),
            claims: vec![],
            initial_context: String::new(),
            max_cycles: 1,
            api_key: None,
        };
        let err = run_harness(State(state), Json(request)).await.err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
