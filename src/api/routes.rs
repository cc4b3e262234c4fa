//! API route definitions

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, MethodRouter};
use axum::Router;

use crate::tracking::{track, Tracker, TrackingConfig};

use super::handlers::{self, demo};
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/logs", get(handlers::logs::list_logs))
        .route("/api/logs/:id", get(handlers::logs::get_log))
        .nest("/api/demo", demo_routes(&state))
        .with_state(state)
}

fn tracked(route: MethodRouter<AppState>, tracker: Tracker) -> MethodRouter<AppState> {
    route.layer(from_fn_with_state(tracker, track))
}

/// Demo views, each wrapped in the tracking configuration it demonstrates
fn demo_routes(state: &AppState) -> Router<AppState> {
    let defaults = &state.config.tracking;
    let tracker = |name: &str, configure: fn(TrackingConfig) -> TrackingConfig| {
        Tracker::new(
            configure(TrackingConfig::with_defaults(demo::view(name), defaults)),
            state.store.clone(),
        )
    };
    let plain: fn(TrackingConfig) -> TrackingConfig = |config| config;

    Router::new()
        .route("/no-logging", get(demo::no_logging))
        .route(
            "/logging",
            tracked(get(demo::logging), tracker("MockLoggingView", plain)),
        )
        .route(
            "/slow-logging",
            tracked(get(demo::slow_logging), tracker("MockSlowLoggingView", plain)),
        )
        .route(
            "/explicit-logging",
            tracked(
                get(demo::no_logging).post(demo::with_logging),
                tracker("MockExplicitLoggingView", |config| {
                    config.logging_methods([Method::POST])
                }),
            ),
        )
        .route(
            "/sensitive-fields-logging",
            tracked(
                get(demo::with_logging),
                tracker("MockSensitiveFieldsLoggingView", |config| {
                    config.sensitive_fields(["mY_fiEld"])
                }),
            ),
        )
        .route(
            "/custom-check-logging",
            tracked(
                get(demo::with_logging).post(demo::no_recording),
                tracker("MockCustomCheckLoggingView", |config| {
                    config.should_log_with(|_, response| {
                        response.body.map_or(false, |body| body.contains("log"))
                    })
                }),
            ),
        )
        .route(
            "/errors-logging",
            tracked(
                get(demo::errors_logging).post(demo::no_logging),
                tracker("MockLoggingErrorsView", TrackingConfig::errors_only),
            ),
        )
        .route(
            "/session-auth-logging",
            tracked(
                get(demo::session_auth_logging),
                tracker("MockSessionAuthLoggingView", plain),
            ),
        )
        .route(
            "/json-logging",
            tracked(
                get(demo::json_get).post(demo::json_post),
                tracker("MockJSONLoggingView", plain),
            ),
        )
        .route(
            "/validation-error-logging",
            tracked(
                get(demo::validation_error),
                tracker("MockValidationErrorLoggingView", plain),
            ),
        )
        .route(
            "/404-error-logging",
            tracked(
                get(demo::not_found_error),
                tracker("Mock404ErrorLoggingView", plain),
            ),
        )
        .route(
            "/500-error-logging",
            tracked(get(demo::server_error), tracker("Mock500ErrorLoggingView", plain)),
        )
        .route(
            "/415-error-logging",
            tracked(
                post(demo::unsupported_media_type),
                tracker("Mock415ErrorLoggingView", plain),
            ),
        )
        .route(
            "/400-body-parse-error-logging",
            tracked(
                post(demo::body_parse_error),
                tracker("Mock400BodyParseErrorLoggingView", plain),
            ),
        )
        .route(
            "/name-view",
            tracked(get(demo::name_view), tracker("MockNameViewSet", plain)),
        )
}
