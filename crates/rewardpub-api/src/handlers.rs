use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rewardpub_store::StoreError;
use rewardpub_types::{EpochId, PublicationRecord};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::state::AppState;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub last_epoch_id: Option<EpochId>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub enum ApiError {
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Store(err) => {
                error!(error = %err, "state store read failed");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Health check endpoint; degraded when the store cannot be read
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label, last_epoch_id) = match state.store.last_epoch_id() {
        Ok(last) => (StatusCode::OK, "ok", last),
        Err(err) => {
            error!(error = %err, "health check could not read the store");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", None)
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            last_epoch_id,
        }),
    )
}

/// Newest publication records first
pub async fn list_publications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PublicationRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(state.store.list(limit)?))
}

pub async fn get_publication(
    State(state): State<AppState>,
    Path(epoch_id): Path<EpochId>,
) -> Result<Json<PublicationRecord>, ApiError> {
    state
        .store
        .get(epoch_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no publication for epoch {}", epoch_id)))
}
