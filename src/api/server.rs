//! API server using Axum
//!
//! Serves the log listing API and the demo views, with request ids, panic
//! recovery and optional JWT authentication in front of every route.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{Result, TrackingError};
use crate::repository::{RequestLogStore, UserStore};

use super::middleware::{authenticate, cors_layer, JwtAuth};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jwt_auth: JwtAuth,
    pub started_at: Instant,
    pub store: Arc<dyn RequestLogStore>,
    pub users: Arc<dyn UserStore>,
}

/// API server
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(
        config: Config,
        store: Arc<dyn RequestLogStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        let jwt_auth = JwtAuth::new(&config.api.jwt_secret)?;

        Ok(Self {
            state: AppState {
                config,
                jwt_auth,
                started_at: Instant::now(),
                store,
                users,
            },
        })
    }

    /// Build the router with its outer layers
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.state.config.api.cors_origins);

        routes::create_router(self.state.clone())
            .layer(from_fn_with_state(
                self.state.jwt_auth.clone(),
                authenticate,
            ))
            .layer(CatchPanicLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(cors)
    }

    /// Run the API server until `shutdown` changes
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self.state.config.api_addr().parse().map_err(|_| {
            TrackingError::InvalidConfig(format!(
                "invalid API server address: {}",
                self.state.config.api_addr()
            ))
        })?;

        let router = self.build_router();

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

        info!("API server shut down");
        Ok(())
    }
}
