//! Demonstration views
//!
//! One handler per tracking configuration. `routes::demo_routes` pairs each
//! handler with the tracking setup it demonstrates.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::Value;

use crate::api::middleware::AuthenticatedUser;
use crate::api::server::AppState;
use crate::error::TrackingError;
use crate::models::{CacheUsage, RequestLogListParams};
use crate::tracking::ViewAction;

/// Fully qualified view name recorded for a demo handler
pub fn view(name: &str) -> String {
    format!("{}::{}", module_path!(), name)
}

pub async fn no_logging() -> Json<&'static str> {
    Json("no logging")
}

pub async fn with_logging() -> Json<&'static str> {
    Json("with logging")
}

/// Reports that part of its data came from a cache
pub async fn logging() -> impl IntoResponse {
    (Extension(CacheUsage::PartFromCache), Json("with logging"))
}

pub async fn slow_logging() -> Json<&'static str> {
    tokio::time::sleep(Duration::from_secs(1)).await;
    Json("with logging")
}

pub async fn no_recording() -> Json<&'static str> {
    Json("no recording")
}

pub async fn errors_logging() -> Result<Json<&'static str>, TrackingError> {
    Err(TrackingError::Api("with logging".into()))
}

pub async fn session_auth_logging(_user: AuthenticatedUser) -> Json<&'static str> {
    Json("with session auth logging")
}

pub async fn json_get() -> Json<Value> {
    Json(serde_json::json!({"get": "response"}))
}

pub async fn json_post() -> Json<Value> {
    Json(serde_json::json!({"post": "response"}))
}

pub async fn validation_error() -> Result<Json<&'static str>, TrackingError> {
    Err(TrackingError::Validation("bad input".into()))
}

pub async fn not_found_error() -> Result<Json<&'static str>, TrackingError> {
    Err(TrackingError::NotFound(
        "No request log matches the given query".into(),
    ))
}

pub async fn server_error() -> Result<Json<&'static str>, TrackingError> {
    Err(TrackingError::Api("response".into()))
}

/// Echo the parsed body back
pub async fn unsupported_media_type(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, TrackingError> {
    json_body(body).map(Json)
}

pub async fn body_parse_error(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<&'static str>, TrackingError> {
    json_body(body)?;
    Ok(Json("Data processed"))
}

/// List request logs under the `list` action
pub async fn name_view(
    State(state): State<AppState>,
    Query(params): Query<RequestLogListParams>,
) -> Result<impl IntoResponse, TrackingError> {
    let logs = state.store.list(&params).await?;
    Ok((Extension(ViewAction("list".to_string())), Json(logs)))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, TrackingError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(e)) => {
            Err(TrackingError::UnsupportedMediaType(e.body_text()))
        }
        Err(e) => Err(TrackingError::ParseError(e.body_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name_is_module_qualified() {
        assert_eq!(view("logging"), "api_tracking::api::handlers::demo::logging");
    }
}
