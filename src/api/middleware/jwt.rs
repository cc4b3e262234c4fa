//! JWT authentication
//!
//! `authenticate` resolves a bearer token into an [`AuthenticatedUser`]
//! request extension. Requests without a valid token pass through as
//! anonymous; handlers that require a user extract [`AuthenticatedUser`],
//! which rejects with 401 when the extension is missing.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::error::{Result, TrackingError};
use crate::tracking::{FaultKind, HandlerFault};

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: &str, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// JWT authentication handler
#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAuth {
    /// Create a new JWT auth handler.
    ///
    /// An empty secret is replaced by 32 random bytes from the OS.
    pub fn new(secret: &str) -> Result<Self> {
        let key = if secret.is_empty() {
            let mut key_bytes = [0u8; 32];
            OsRng.try_fill_bytes(&mut key_bytes).map_err(|e| {
                TrackingError::InvalidConfig(format!("failed to generate JWT secret: {}", e))
            })?;

            debug!("Generated random JWT secret");
            key_bytes.to_vec()
        } else {
            secret.as_bytes().to_vec()
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
        })
    }

    pub fn generate_token(
        &self,
        user_id: i64,
        username: &str,
        expiry_hours: i64,
    ) -> std::result::Result<String, AuthError> {
        let claims = Claims::new(user_id, username, expiry_hours);

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to generate JWT: {}", e);
            AuthError::TokenCreation
        })
    }

    pub fn validate_token(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT validation failed: {}", e);
                AuthError::InvalidToken
            })
    }

    /// Extract token from Authorization header
    pub fn extract_token(authorization: &str) -> Option<&str> {
        authorization.strip_prefix("Bearer ")
    }

    /// Resolve the user named by the request's bearer token, if any
    pub fn user_from_parts(&self, headers: &axum::http::HeaderMap) -> Option<AuthenticatedUser> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())?;
        let token = Self::extract_token(authorization)?;
        let claims = self.validate_token(token).ok()?;
        let user_id = claims.sub.parse::<i64>().ok()?;

        Some(AuthenticatedUser {
            user_id,
            username: claims.username,
        })
    }
}

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    WrongCredentials,
    TokenCreation,
    InvalidToken,
    MissingToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::WrongCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::TokenCreation => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token")
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
        };

        let kind = if status.is_server_error() {
            FaultKind::Server
        } else {
            FaultKind::Client
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        response
            .extensions_mut()
            .insert(HandlerFault::new(kind, format!("{:?}", self)));
        response
    }
}

/// The user a request was authenticated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        if parts.headers.contains_key(header::AUTHORIZATION) {
            Err(AuthError::InvalidToken)
        } else {
            Err(AuthError::MissingToken)
        }
    }
}

/// Attach the bearer token's user to the request. Never rejects.
pub async fn authenticate(State(auth): State<JwtAuth>, mut request: Request, next: Next) -> Response {
    if let Some(user) = auth.user_from_parts(request.headers()) {
        debug!(user_id = user.user_id, "Authenticated request");
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn router(auth: JwtAuth) -> Router {
        Router::new()
            .route(
                "/me",
                get(|user: AuthenticatedUser| async move { user.username }),
            )
            .layer(from_fn_with_state(auth, authenticate))
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let auth = JwtAuth::new("test-secret").unwrap();

        let token = auth.generate_token(42, "alice", 24).unwrap();
        let claims = auth.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_jwt_random_secret() {
        let auth = JwtAuth::new("").unwrap();
        let token = auth.generate_token(1, "alice", 24).unwrap();
        assert!(auth.validate_token(&token).is_ok());
    }

    #[test]
    fn test_jwt_invalid_and_expired_tokens() {
        let auth = JwtAuth::new("test-secret").unwrap();

        let result = auth.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AuthError::InvalidToken)));

        let token = auth.generate_token(1, "alice", -1).unwrap();
        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(JwtAuth::extract_token("Bearer abc123"), Some("abc123"));
        assert_eq!(JwtAuth::extract_token("abc123"), None);
    }

    #[tokio::test]
    async fn test_authenticate_inserts_user() {
        let auth = JwtAuth::new("test-secret").unwrap();
        let token = auth.generate_token(7, "alice", 1).unwrap();

        let response = router(auth)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn test_anonymous_request_rejected_by_extractor() {
        let auth = JwtAuth::new("test-secret").unwrap();

        let response = router(auth.clone())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(auth)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/me")
                    .header("authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<HandlerFault>().is_some());
    }
}
