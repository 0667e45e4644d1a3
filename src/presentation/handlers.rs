// HTTP request handlers
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::channel::Channel;
use crate::domain::errors::StoreError;
use crate::domain::log::format_timestamp;
use crate::presentation::app_state::AppState;

#[derive(Deserialize)]
pub struct LogRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateFieldRequest {
    pub field: String,
    pub value: Value,
}

#[derive(Deserialize)]
pub struct AppendLogRequest {
    pub value: f64,
    pub timestamp: Option<String>,
}

fn ok_data(data: impl Serialize) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "timestamp": format_timestamp(Utc::now()),
    }))
}

fn ok_message(message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "timestamp": format_timestamp(Utc::now()),
    }))
}

fn error_body(error: String) -> Json<Value> {
    Json(json!({"success": false, "error": error}))
}

/// The transport-visible status for a store failure.
fn failure(e: StoreError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", e);
    }
    (status, error_body(e.to_string()))
}

/// Full cached snapshot.
pub async fn get_all_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok_data(state.store.get_snapshot())
}

/// Variable category with min/max recomputed from history and persisted.
pub async fn get_variable_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.logs.refresh_min_max() {
        Ok(_) => ok_data(state.store.get_snapshot().variable).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

pub async fn get_alarm_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.alarms.alarm_config() {
        Some(config) => ok_data(config).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body("alarm configuration not found".to_string()),
        )
            .into_response(),
    }
}

pub async fn save_alarm_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let Value::Object(doc) = body else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("alarm configuration must be a JSON object".to_string()),
        )
            .into_response();
    };
    match state.alarms.save_alarm_config(doc) {
        Ok(()) => ok_message("alarm configuration saved").into_response(),
        Err(e) => failure(e).into_response(),
    }
}

pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Json(channel): Json<Channel>,
) -> impl IntoResponse {
    let id = channel.id;
    match state.channels.create(channel) {
        Ok(()) => ok_message(&format!("channel {id} created")).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

pub async fn update_channel_field(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateFieldRequest>,
) -> impl IntoResponse {
    match state
        .channels
        .update_field(id, &request.field, &request.value)
    {
        Ok(()) => ok_message(&format!("channel {id} field {} updated", request.field))
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

pub async fn delete_channel(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.channels.delete(id) {
        Ok(()) => ok_message(&format!("channel {id} deleted")).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

pub async fn list_channels(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok_data(state.channels.list())
}

pub async fn get_channel(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.channels.get(id) {
        Some(channel) => ok_data(channel).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body(format!("channel {id} not found")),
        )
            .into_response(),
    }
}

pub async fn list_live_values(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok_data(state.channels.live_values())
}

pub async fn get_live_value(
    Path(channel_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.channels.live_value(channel_id) {
        Some(live) => ok_data(live).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body(format!("no live value for channel {channel_id}")),
        )
            .into_response(),
    }
}

pub async fn get_logs(
    Path(channel_id): Path<i64>,
    Query(range): Query<LogRangeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.logs.query(
        channel_id,
        range.start_date.as_deref(),
        range.end_date.as_deref(),
    ) {
        Some(log) => ok_data(log).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body(format!("no log data for channel {channel_id}")),
        )
            .into_response(),
    }
}

pub async fn append_log(
    Path(channel_id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AppendLogRequest>,
) -> impl IntoResponse {
    match state
        .logs
        .append(channel_id, request.value, request.timestamp)
    {
        Ok(()) => ok_message(&format!("log entry saved for channel {channel_id}")).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Evaluate alarms now. Also the manual sampling heartbeat.
pub async fn check_alarms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let events = state.alarms.evaluate();
    let count = events.len();
    Json(json!({
        "success": true,
        "data": events,
        "count": count,
        "timestamp": format_timestamp(Utc::now()),
    }))
}

/// Push every current live value through the deduplicated history append.
pub async fn auto_save_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.logs.sync_from_live() {
        Ok(appended) => Json(json!({
            "success": true,
            "message": "live values synchronized into the log",
            "appended": appended,
            "timestamp": format_timestamp(Utc::now()),
        }))
        .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Report whether any tracked document changed; a detected change also syncs
/// live values into the history, like the broadcast heartbeat would.
pub async fn check_data_changes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let changed = state.store.has_pending_changes();
    if changed {
        if let Err(e) = state.logs.sync_from_live() {
            tracing::warn!("log sync after change detection failed: {}", e);
        }
    }
    Json(json!({
        "success": true,
        "changes_detected": changed,
        "timestamp": format_timestamp(Utc::now()),
    }))
}

/// Administrative reload: rescan everything and rebuild the snapshot.
pub async fn reload_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok_data(state.store.force_reload())
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": format_timestamp(Utc::now()),
        "server": "Hydrolink Telemetry API",
    }))
}

pub async fn server_info() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "server_info": {
            "name": "Hydrolink Telemetry Server",
            "version": env!("CARGO_PKG_VERSION"),
            "status": "running",
            "timestamp": format_timestamp(Utc::now()),
        },
    }))
}
