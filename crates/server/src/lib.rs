//! Mall Voice Server
//!
//! Provides the HTTP endpoints the voice gateway calls for each call event,
//! plus read-only learning and error reports for the admin side.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{
    init_metrics, record_call_ended, record_error_cleanup, record_request, record_turn,
    set_active_calls, set_error_counts,
};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use mall_voice_agent::AgentError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] mall_voice_config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::InvalidEvent(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::CallNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
