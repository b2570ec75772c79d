//! HTTP Endpoints
//!
//! Gateway webhooks under `/voice`, learning and error reports under `/api`.

use axum::{
    extract::{Json, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use mall_voice_agent::{AgentError, TurnResponse};
use mall_voice_core::GatewayEvent;

use crate::metrics::{metrics_handler, record_error_cleanup, record_request, record_turn};
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let (cors_layer, timeout) = {
        let config = state.get_config();
        (
            build_cors_layer(&config.server.cors_origins, config.server.cors_enabled),
            Duration::from_secs(config.server.timeout_seconds),
        )
    };

    Router::new()
        // Gateway webhooks
        .route("/voice/incoming", post(voice_incoming))
        .route("/voice/silence", post(voice_silence))
        .route("/voice/transfer-status", post(voice_transfer_status))
        .route("/voice/hangup", post(voice_hangup))
        // Learning reports
        .route("/api/learning/report", get(learning_report))
        .route("/api/learning/keywords", get(learning_keywords))
        .route("/api/learning/intents", get(learning_intents))
        .route("/api/learning/confidence", get(learning_confidence))
        .route("/api/learning/reset", post(learning_reset))
        // Error reports
        .route("/api/errors/report", get(errors_report))
        .route("/api/errors/cleanup", post(errors_cleanup))
        .route("/api/sessions/count", get(session_count))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/admin/reload-config", post(reload_config))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let mut parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        if !origins.is_empty() {
            tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        } else {
            tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        }
        parsed_origins.push(HeaderValue::from_static("http://localhost:3000"));
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Body for events that only carry the call id
#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub call_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferStatusRequest {
    pub call_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    pub min_frequency: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StatusMessage {
    status: &'static str,
    message: String,
}

/// Record the request and turn metrics for a webhook result
fn finish_turn(
    endpoint: &'static str,
    result: Result<TurnResponse, AgentError>,
) -> Result<Json<TurnResponse>, ServerError> {
    match result {
        Ok(response) => {
            record_request(endpoint, StatusCode::OK);
            record_turn(&response);
            Ok(Json(response))
        },
        Err(err) => {
            let err = ServerError::from(err);
            record_request(endpoint, StatusCode::from(&err));
            Err(err)
        },
    }
}

/// POST /voice/incoming
async fn voice_incoming(
    State(state): State<AppState>,
    Json(event): Json<GatewayEvent>,
) -> Result<Json<TurnResponse>, ServerError> {
    let result = state.orchestrator.handle_incoming(event).await;
    finish_turn("incoming", result)
}

/// POST /voice/silence
async fn voice_silence(
    State(state): State<AppState>,
    Json(request): Json<CallRequest>,
) -> Result<Json<TurnResponse>, ServerError> {
    let result = state
        .orchestrator
        .handle_silence_timeout(&request.call_id)
        .await;
    finish_turn("silence", result)
}

/// POST /voice/transfer-status
async fn voice_transfer_status(
    State(state): State<AppState>,
    Json(request): Json<TransferStatusRequest>,
) -> Result<Json<TurnResponse>, ServerError> {
    let result = state
        .orchestrator
        .handle_transfer_status(&request.call_id, &request.status)
        .await;
    finish_turn("transfer_status", result)
}

/// POST /voice/hangup
///
/// Unknown call ids are accepted; the gateway may report a hangup after the
/// call was already closed.
async fn voice_hangup(
    State(state): State<AppState>,
    Json(request): Json<CallRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if request.call_id.trim().is_empty() {
        record_request("hangup", StatusCode::BAD_REQUEST);
        return Err(ServerError::InvalidRequest("missing call_id".to_string()));
    }

    let summary = state.orchestrator.handle_hangup(&request.call_id).await;
    record_request("hangup", StatusCode::OK);
    Ok(Json(serde_json::json!({
        "call_id": request.call_id,
        "summary": summary,
    })))
}

async fn learning_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.learning.report())
}

async fn learning_keywords(
    State(state): State<AppState>,
    Query(query): Query<FrequencyQuery>,
) -> impl IntoResponse {
    let min = query
        .min_frequency
        .unwrap_or_else(|| state.get_config().learning.min_keyword_frequency);
    Json(state.learning.suggested_keywords(min))
}

async fn learning_intents(
    State(state): State<AppState>,
    Query(query): Query<FrequencyQuery>,
) -> impl IntoResponse {
    let min = query
        .min_frequency
        .unwrap_or_else(|| state.get_config().learning.min_intent_frequency);
    Json(state.learning.suggested_intents(min))
}

async fn learning_confidence(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.learning.confidence_adjustments())
}

async fn learning_reset(State(state): State<AppState>) -> impl IntoResponse {
    state.learning.reset();
    tracing::info!("Learning aggregates reset");
    Json(StatusMessage {
        status: "success",
        message: "Learning data reset".to_string(),
    })
}

async fn errors_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.errors.report())
}

async fn errors_cleanup(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.errors.cleanup();
    record_error_cleanup(removed);
    Json(serde_json::json!({ "removed": removed }))
}

async fn session_count(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "count": state.contexts.count() }))
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();

    let store_count = state.catalog.len();
    let catalog_ok = store_count > 0;
    checks.insert(
        "catalog".to_string(),
        serde_json::json!({
            "status": if catalog_ok { "ok" } else { "empty" },
            "stores": store_count
        }),
    );
    checks.insert(
        "sessions".to_string(),
        serde_json::json!({
            "status": "ok",
            "active": state.contexts.count()
        }),
    );
    checks.insert(
        "errors".to_string(),
        serde_json::json!({
            "status": "ok",
            "retained": state.errors.counts().total()
        }),
    );

    let (status, status_code) = if catalog_ok {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks
        })),
    )
}

/// POST /admin/reload-config
///
/// Note: CORS and dialogue policy are only applied at startup.
async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusMessage {
                status: "success",
                message: "Configuration reloaded successfully".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusMessage {
                    status: "error",
                    message: e.to_string(),
                }),
            )
        },
    }
}
