//! Request tracking middleware
//!
//! Wraps a route handler, captures the request and its outcome, and writes
//! one request log per tracked call. The handler's response is returned
//! unchanged and a handler panic is resumed after it has been recorded.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, OriginalUri, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

use crate::api::middleware::AuthenticatedUser;
use crate::error::TrackingError;
use crate::models::{truncate, CacheUsage, NewRequestLog, MAX_PATH_LEN};
use crate::repository::RequestLogStore;

use super::capture;
use super::config::{
    ClientErrorPolicy, PersistFailurePolicy, RequestSummary, ResponseCapture, ResponseSummary,
    TrackingConfig, TrackingMode,
};
use super::outcome::{FaultKind, HandlerFault, ViewAction};

/// Tracking configuration of one route together with the store it writes to
#[derive(Clone)]
pub struct Tracker {
    config: Arc<TrackingConfig>,
    store: Arc<dyn RequestLogStore>,
}

/// What an outcome contributes to the log entry
enum Recorded {
    Response,
    Error(String),
    Skip,
}

impl Tracker {
    pub fn new(config: TrackingConfig, store: Arc<dyn RequestLogStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    async fn complete(
        &self,
        mut entry: NewRequestLog,
        request: RequestSummary,
        started: Instant,
        response: Response,
    ) -> Response {
        let config = self.config.as_ref();
        let (parts, body) = response.into_parts();
        let is_json = capture::is_json(&parts.headers);

        let (body, body_bytes) = if config.wants_response_body(is_json) {
            match capture::buffer_body(body, config.max_body_bytes).await {
                Ok(buffered) => buffered,
                Err(e) => {
                    error!(view = %config.view, "Failed to read response body: {}", e);
                    (failed_body(e), None)
                }
            }
        } else {
            (body, None)
        };

        entry.response_ms = elapsed_ms(started);

        let status = parts.status;
        entry.status_code = Some(i32::from(status.as_u16()));
        entry.kind_of_cache_using = parts.extensions.get::<CacheUsage>().copied();
        if let Some(view_method) = parts
            .extensions
            .get::<ViewAction>()
            .map(|action| action.0.clone())
            .or_else(|| config.view_method.clone())
        {
            entry.view_method = truncate(&view_method, MAX_PATH_LEN);
        }

        let fault = parts.extensions.get::<HandlerFault>().cloned();
        let recorded = match config.mode {
            TrackingMode::Requests => match fault {
                Some(fault) if fault.kind == FaultKind::Server => Recorded::Error(fault.detail),
                Some(fault) if config.client_errors == ClientErrorPolicy::RecordError => {
                    Recorded::Error(fault.detail)
                }
                _ => Recorded::Response,
            },
            TrackingMode::ErrorsOnly => match fault {
                Some(fault) if fault.kind == FaultKind::Server => Recorded::Error(fault.detail),
                None if status.is_server_error() => {
                    Recorded::Error(HandlerFault::from_status(status).detail)
                }
                _ => Recorded::Skip,
            },
        };

        let body_text = body_bytes
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        let should_log = match recorded {
            Recorded::Skip => false,
            _ => config.should_log(
                &request,
                &ResponseSummary {
                    status,
                    headers: &parts.headers,
                    body: body_text.as_deref(),
                },
            ),
        };

        if should_log {
            match recorded {
                Recorded::Error(detail) => entry.errors = Some(detail),
                Recorded::Response
                    if is_json && config.response_capture == ResponseCapture::Structured =>
                {
                    entry.response = body_text.map(|text| match serde_json::from_str::<Value>(&text) {
                        Ok(value) => capture::serialize(config.redactor().clean(value))
                            .unwrap_or(text),
                        Err(_) => text,
                    });
                }
                _ => {}
            }
        }

        let response = Response::from_parts(parts, body);

        if !should_log {
            debug!(view = %config.view, method = %request.method, "Request not logged");
            return response;
        }

        self.persist(entry, response).await
    }

    async fn persist(&self, entry: NewRequestLog, response: Response) -> Response {
        match self.store.insert(&entry).await {
            Ok(id) => {
                debug!(id, view = %entry.view, "Recorded request log");
                response
            }
            Err(e) => match self.config.persist_failure {
                PersistFailurePolicy::Drop => {
                    error!(view = %entry.view, path = %entry.path, "Failed to record request log: {}", e);
                    response
                }
                PersistFailurePolicy::Propagate => {
                    error!(view = %entry.view, path = %entry.path, "Failed to record request log: {}", e);
                    TrackingError::Internal(format!("failed to record request log: {}", e))
                        .into_response()
                }
            },
        }
    }

    /// Record a handler panic. Only errors-only routes record panics.
    async fn record_panic(
        &self,
        mut entry: NewRequestLog,
        request: RequestSummary,
        started: Instant,
        fault: HandlerFault,
    ) {
        let config = self.config.as_ref();
        if config.mode != TrackingMode::ErrorsOnly {
            return;
        }

        entry.response_ms = elapsed_ms(started);
        entry.status_code = Some(i32::from(StatusCode::INTERNAL_SERVER_ERROR.as_u16()));
        if let Some(ref view_method) = config.view_method {
            entry.view_method = truncate(view_method, MAX_PATH_LEN);
        }

        let headers = HeaderMap::new();
        let response = ResponseSummary {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: &headers,
            body: None,
        };
        if !config.should_log(&request, &response) {
            return;
        }

        entry.errors = Some(fault.detail);
        if let Err(e) = self.store.insert(&entry).await {
            error!(view = %entry.view, path = %entry.path, "Failed to record handler panic: {}", e);
        }
    }
}

/// A body that yields `error` to whoever reads it
fn failed_body(error: axum::Error) -> Body {
    Body::from_stream(futures::stream::once(async move {
        Err::<Bytes, axum::Error>(error)
    }))
}

fn elapsed_ms(started: Instant) -> i32 {
    started.elapsed().as_millis().min(i32::MAX as u128) as i32
}

/// Tracking middleware, applied per route with
/// `axum::middleware::from_fn_with_state(tracker, track)`.
pub async fn track(State(tracker): State<Tracker>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let config = tracker.config.as_ref();

    if config.skips(request.method()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let user_id = parts
        .extensions
        .get::<AuthenticatedUser>()
        .map(|user| user.user_id);

    // Nested routers strip their prefix from the URI they pass down
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| parts.uri.clone());

    let mut entry = NewRequestLog::started(Utc::now(), parts.method.as_str(), uri.path());
    entry.user_id = user_id;
    entry.request_id = capture::request_id(&parts.headers);
    entry.remote_addr = capture::client_ip(&parts.headers, peer).to_string();
    entry.host = capture::host(&parts.headers, &uri);
    entry.view = truncate(&config.view, MAX_PATH_LEN);
    entry.query_params = capture::query_params(uri.query(), config.redactor());

    let summary = RequestSummary {
        method: parts.method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        user_id,
    };

    // Bodies are single-use; read it now so the handler still gets every byte
    let body = match capture::buffer_body(body, config.max_body_bytes).await {
        Ok((body, bytes)) => {
            entry.data = bytes
                .as_deref()
                .and_then(|bytes| capture::parse_body(&parts.headers, bytes))
                .map(|value| config.redactor().clean(value))
                .and_then(capture::serialize);
            body
        }
        Err(e) => {
            debug!(view = %config.view, "Failed to read request body: {}", e);
            return TrackingError::InvalidRequest(format!("failed to read request body: {}", e))
                .into_response();
        }
    };

    let outcome = AssertUnwindSafe(next.run(Request::from_parts(parts, body)))
        .catch_unwind()
        .await;

    match outcome {
        Ok(response) => tracker.complete(entry, summary, started, response).await,
        Err(panic) => {
            let fault = HandlerFault::from_panic(panic.as_ref());
            tracker.record_panic(entry, summary, started, fault).await;
            std::panic::resume_unwind(panic)
        }
    }
}
