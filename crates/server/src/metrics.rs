//! Prometheus Metrics
//!
//! Counters and gauges for call handling, exported at `/metrics`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use mall_voice_agent::{ErrorCounts, TurnResponse};
use mall_voice_core::Directive;

use crate::state::AppState;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder (idempotent)
///
/// Returns `None` when another recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map_err(|e| tracing::warn!(error = %e, "Failed to install Prometheus recorder"))
        .ok()
        .cloned()
}

/// Count an HTTP request by endpoint and status
pub fn record_request(endpoint: &'static str, status: StatusCode) {
    metrics::counter!(
        "mall_voice_requests_total",
        "endpoint" => endpoint,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

/// Count a handled turn by intent and resulting state
pub fn record_turn(response: &TurnResponse) {
    let intent = response.intent.map(|i| i.as_str()).unwrap_or("none");
    metrics::counter!(
        "mall_voice_turns_total",
        "intent" => intent,
        "state" => response.state.display_name()
    )
    .increment(1);

    if response
        .directives
        .iter()
        .any(|d| matches!(d, Directive::Transfer { .. }))
    {
        metrics::counter!("mall_voice_transfers_total").increment(1);
    }
    if let Some(confidence) = response.confidence {
        metrics::histogram!("mall_voice_intent_confidence").record(f64::from(confidence));
    }
}

pub fn record_call_ended(reason: &str) {
    metrics::counter!("mall_voice_calls_ended_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_error_cleanup(removed: usize) {
    metrics::counter!("mall_voice_error_records_purged_total").increment(removed as u64);
}

pub fn set_active_calls(count: usize) {
    metrics::gauge!("mall_voice_active_calls").set(count as f64);
}

/// Error records currently retained, by kind
pub fn set_error_counts(counts: &ErrorCounts) {
    let kinds = [
        ("intent_error", counts.intent_errors),
        ("response_error", counts.response_errors),
        ("transfer_error", counts.transfer_errors),
        ("timeout_error", counts.timeout_errors),
        ("negative_feedback", counts.negative_feedback),
    ];
    for (kind, count) in kinds {
        metrics::gauge!("mall_voice_error_records", "kind" => kind).set(count as f64);
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    set_active_calls(state.contexts.count());
    set_error_counts(&state.errors.counts());
    match PROMETHEUS.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
