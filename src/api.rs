//! HTTP surface: `/api/v1/*` routes over the inventory and dispatcher.
//!
//! Lifecycle routes answer as soon as the work is dispatched; a 200 means
//! "accepted", not "done".

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, FailedToBufferBody};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use thiserror::Error;

use crate::descriptor::CreateDescriptor;
use crate::dispatch::Dispatcher;
use crate::inventory::{Inventory, Snapshot};
use crate::tool::{Cbsd, ToolRunner};

/// Upper bound on request bodies the gateway is willing to buffer.
const BODY_LIMIT: usize = 1024 * 1024;

// ── Shared state ────────────────────────────────────────────────────

pub struct Gateway {
    pub inventory: Inventory,
    pub dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(runner: Arc<dyn ToolRunner>, cbsd: Cbsd) -> Self {
        Self {
            inventory: Inventory::new(runner.clone(), cbsd.clone()),
            dispatcher: Dispatcher::new(runner, cbsd),
        }
    }
}

pub type SharedGateway = Arc<Gateway>;

pub fn router(gateway: SharedGateway) -> Router {
    Router::new()
        .route("/api/v1/blist", get(list))
        .route("/api/v1/cacheblist", get(cached_list))
        .route("/api/v1/bstart/:name", post(start))
        .route("/api/v1/bstop/:name", post(stop))
        .route("/api/v1/bremove/:name", post(remove))
        .route("/api/v1/bcreate/:name", post(create))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(gateway)
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body exceeds {} bytes", BODY_LIMIT)]
    BodyTooLarge,

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("Please send a request body")]
    MissingBody,

    #[error("invalid create descriptor: {0}")]
    InvalidDescriptor(serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingBody | ApiError::InvalidDescriptor(_) => StatusCode::BAD_REQUEST,
        };
        tracing::warn!(%status, "request rejected: {}", self);
        (status, self.to_string()).into_response()
    }
}

/// Over the limit is the client's fault; anything else went wrong on our side.
fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            ApiError::BodyTooLarge
        }
        other => ApiError::BodyRead(other.body_text()),
    })
}

// ── Handlers ────────────────────────────────────────────────────────

/// Live listing. A failed `bls` is logged and the unchanged cache is served.
async fn list(State(gw): State<SharedGateway>) -> Json<Snapshot> {
    match gw.inventory.sync().await {
        Ok(snapshot) => Json(snapshot),
        Err(e) => {
            tracing::warn!("live listing failed, serving cached inventory: {e}");
            Json(gw.inventory.read().await)
        }
    }
}

async fn cached_list(State(gw): State<SharedGateway>) -> Json<Snapshot> {
    Json(gw.inventory.read().await)
}

async fn start(State(gw): State<SharedGateway>, Path(name): Path<String>) -> StatusCode {
    tracing::debug!(vm = %name, "start requested");
    gw.dispatcher.start(&name);
    StatusCode::OK
}

/// The body is drained but carries nothing; the path names the VM.
async fn stop(
    State(gw): State<SharedGateway>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ApiError> {
    let body = read_body(body)?;
    tracing::debug!(vm = %name, body_len = body.len(), "stop requested");
    gw.dispatcher.stop(&name);
    Ok(StatusCode::OK)
}

async fn remove(
    State(gw): State<SharedGateway>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ApiError> {
    let body = read_body(body)?;
    tracing::debug!(vm = %name, body_len = body.len(), "remove requested");
    gw.dispatcher.remove(&name);
    Ok(StatusCode::OK)
}

/// Echoes the descriptor (with the path name forced in) before dispatching.
async fn create(
    State(gw): State<SharedGateway>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<CreateDescriptor>, ApiError> {
    let body = read_body(body)?;
    if body.is_empty() {
        return Err(ApiError::MissingBody);
    }

    let descriptor = serde_json::from_slice::<CreateDescriptor>(&body)
        .map_err(ApiError::InvalidDescriptor)?
        .with_name(&name);

    gw.dispatcher.create(&descriptor);
    Ok(Json(descriptor))
}
