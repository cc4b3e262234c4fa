//! Authentication handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::middleware::AuthError;
use crate::api::server::AppState;
use crate::error::TrackingError;

const TOKEN_EXPIRY_HOURS: i64 = 24;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
}

/// Exchange the admin credentials for a token. The user row backing the
/// token is created on first login.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, TrackingError> {
    if req.username != state.config.admin.username || req.password != state.config.admin.password {
        warn!("Login failed for user: {}", req.username);
        return Err(TrackingError::InvalidCredentials);
    }

    let user = state.users.get_or_create(&req.username).await?;
    let token = state
        .jwt_auth
        .generate_token(user.id, &user.username, TOKEN_EXPIRY_HOURS)
        .map_err(|e| match e {
            AuthError::TokenCreation => TrackingError::Internal("failed to create token".into()),
            _ => TrackingError::AuthenticationFailed,
        })?;

    info!(user_id = user.id, "User {} logged in successfully", user.username);

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token,
            expires_in: TOKEN_EXPIRY_HOURS * 3600,
        }),
    ))
}
