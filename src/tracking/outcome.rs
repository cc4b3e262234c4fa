//! Markers a handler attaches to its response for the tracking middleware

use std::any::Any;

use axum::http::StatusCode;

/// Class of a handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Bad input from the caller (validation, parse, not found)
    Client,
    /// Unhandled failure on our side
    Server,
}

/// Response extension describing the error a handler returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFault {
    pub kind: FaultKind,
    pub detail: String,
}

impl HandlerFault {
    pub fn new(kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Fault for a 5xx response that carried no description
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(
            FaultKind::Server,
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Server Error")
            ),
        )
    }

    /// Fault for a handler panic
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self::new(FaultKind::Server, format!("panic: {}", message))
    }
}

/// Response extension naming the routed action, stored as `view_method`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewAction(pub String);
