//! Request log listing handlers

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use crate::api::middleware::AuthenticatedUser;
use crate::api::server::AppState;
use crate::error::TrackingError;
use crate::models::RequestLogListParams;

/// List request logs, newest first, each with its user resolved
pub async fn list_logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<RequestLogListParams>,
) -> Result<impl IntoResponse, TrackingError> {
    debug!(user_id = user.user_id, ?params, "Listing request logs");

    let response = state.store.list(&params).await?;
    Ok(Json(response))
}

/// Get a single request log
pub async fn get_log(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, TrackingError> {
    match state.store.get(id).await? {
        Some(log) => Ok(Json(log)),
        None => Err(TrackingError::RequestLogNotFound { id }),
    }
}
