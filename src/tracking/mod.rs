//! Request tracking: per-route configuration, payload capture and redaction,
//! and the middleware that turns each tracked call into a request log.

pub mod capture;
pub mod config;
pub mod middleware;
pub mod outcome;
pub mod redact;

pub use config::{
    ClientErrorPolicy, LogDecision, LoggingMethods, PersistFailurePolicy, RequestSummary,
    ResponseCapture, ResponseSummary, TrackingConfig, TrackingMode,
};
pub use middleware::{track, Tracker};
pub use outcome::{FaultKind, HandlerFault, ViewAction};
pub use redact::{Redactor, DEFAULT_SENSITIVE_FIELDS, REDACTED};
