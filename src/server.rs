//! HTTP control surface: campaign start/stop/status, list management, the
//! call event log and the provider status callback.

use crate::error::StorageError;
use crate::model::{CallEvent, ControlReply, ControlStatus, PhoneNumber, RunState};
use crate::orchestrator::{apply_start, RunController};
use crate::storage::{CampaignStore, FileStore};
use anyhow::{Context, Result};
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_EVENT_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub controller: RunController,
    pub store: Arc<FileStore>,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Lists {
    pub numbers: Vec<PhoneNumber>,
    pub dnc: Vec<PhoneNumber>,
}

#[derive(Debug, Deserialize)]
struct NumberInput {
    number: String,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

/// Build the router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/dialing/start", post(start_handler))
        .route("/dialing/stop", post(stop_handler))
        .route("/dialing/status", get(status_handler))
        .route("/numbers", get(numbers_handler).post(add_number_handler))
        .route("/numbers/clear", post(clear_numbers_handler))
        .route("/dnc", post(add_dnc_handler))
        .route("/events", get(events_handler))
        .route("/status", post(call_status_handler))
        .with_state(state)
}

/// Serve until Ctrl-C, then stop any active run.
pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "dialer control surface listening");

    let controller = state.controller.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if controller.is_active() {
        controller.stop().await;
    }
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn start_handler(State(state): State<AppState>) -> Json<ControlReply> {
    Json(apply_start(&state.controller).into())
}

async fn stop_handler(State(state): State<AppState>) -> Json<ControlReply> {
    state.controller.stop().await;
    Json(ControlStatus::Stopped.into())
}

async fn status_handler(State(state): State<AppState>) -> Json<RunState> {
    Json(state.controller.snapshot())
}

fn lists(store: &FileStore) -> Result<Json<Lists>, ApiError> {
    Ok(Json(Lists {
        numbers: store.list_numbers()?,
        dnc: store.list_dnc()?,
    }))
}

async fn numbers_handler(State(state): State<AppState>) -> Result<Json<Lists>, ApiError> {
    lists(&state.store)
}

async fn add_number_handler(
    State(state): State<AppState>,
    Json(input): Json<NumberInput>,
) -> Result<Json<Lists>, ApiError> {
    let number = PhoneNumber::parse(&input.number).ok_or(ApiError::BadRequest("number is empty"))?;
    state.store.append_numbers([number])?;
    lists(&state.store)
}

async fn clear_numbers_handler(State(state): State<AppState>) -> Result<Json<Lists>, ApiError> {
    state.store.clear_numbers()?;
    lists(&state.store)
}

async fn add_dnc_handler(
    State(state): State<AppState>,
    Json(input): Json<NumberInput>,
) -> Result<Json<Lists>, ApiError> {
    let number = PhoneNumber::parse(&input.number).ok_or(ApiError::BadRequest("number is empty"))?;
    state.store.add_to_dnc(&number)?;
    lists(&state.store)
}

async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<CallEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Ok(Json(state.store.recent_events(limit)?))
}

/// Provider call progress callback, sent as a form or as JSON.
async fn call_status_handler(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let payload: serde_json::Map<String, serde_json::Value> = if is_json {
        let Json(map) = Json::<serde_json::Map<String, serde_json::Value>>::from_request(req, &())
            .await
            .map_err(|_| ApiError::BadRequest("malformed JSON body"))?;
        map
    } else {
        let Form(map) = Form::<HashMap<String, String>>::from_request(req, &())
            .await
            .map_err(|_| ApiError::BadRequest("malformed form body"))?;
        map.into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect()
    };

    let field = |key: &str| payload.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let call_sid = field("CallSid").unwrap_or_else(|| "unknown".into());
    let number = PhoneNumber::from(field("To").unwrap_or_default().as_str());
    let event = field("CallStatus")
        .or_else(|| field("CallEvent"))
        .unwrap_or_else(|| "unknown".into());

    state
        .store
        .log_event(&call_sid, &number, &event, serde_json::Value::Object(payload))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
