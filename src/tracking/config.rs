//! Per-route tracking configuration

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};

use crate::config::TrackingDefaults;

use super::redact::Redactor;

/// Which HTTP methods a route logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingMethods {
    All,
    Only(Vec<Method>),
}

impl LoggingMethods {
    pub fn only<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        LoggingMethods::Only(methods.into_iter().collect())
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            LoggingMethods::All => true,
            LoggingMethods::Only(methods) => methods.contains(method),
        }
    }

    /// Parse a comma-separated list; empty or `__all__` means every method
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "__all__" {
            return Ok(LoggingMethods::All);
        }

        let methods = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Method::from_bytes(s.to_uppercase().as_bytes())
                    .map_err(|_| format!("invalid HTTP method: {}", s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoggingMethods::Only(methods))
    }
}

/// Whether a route records every request or only server faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Requests,
    ErrorsOnly,
}

/// When the response body is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCapture {
    /// Store JSON response bodies; other bodies are omitted
    Structured,
    Disabled,
}

/// Where a client-class handler error (validation, parse, not found) is stored
/// in `Requests` mode. `ErrorsOnly` mode never records these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorPolicy {
    /// Store the rendered error response in `response`
    RecordResponse,
    /// Store the error representation in `errors`
    RecordError,
}

/// What happens to the response when the log write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistFailurePolicy {
    /// Report through tracing and return the handler's response unchanged
    Drop,
    /// Replace the handler's response with a 500
    Propagate,
}

/// Request attributes available to a logging decision
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub user_id: Option<i64>,
}

/// Final response as seen by a logging decision
#[derive(Debug, Clone, Copy)]
pub struct ResponseSummary<'a> {
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    /// Body text, when the body was small enough to buffer
    pub body: Option<&'a str>,
}

pub type DecisionFn = dyn Fn(&RequestSummary, &ResponseSummary<'_>) -> bool + Send + Sync;

/// How a route decides whether to log a request
#[derive(Clone)]
pub enum LogDecision {
    /// Log when the request method is in `logging_methods`
    Default,
    Custom(Arc<DecisionFn>),
}

impl fmt::Debug for LogDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogDecision::Default => f.write_str("Default"),
            LogDecision::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Tracking behaviour of one route
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub view: String,
    pub view_method: Option<String>,
    pub mode: TrackingMode,
    pub logging_methods: LoggingMethods,
    pub decision: LogDecision,
    pub response_capture: ResponseCapture,
    pub client_errors: ClientErrorPolicy,
    pub persist_failure: PersistFailurePolicy,
    pub max_body_bytes: usize,
    redactor: Redactor,
}

impl TrackingConfig {
    /// Track `view` with the built-in defaults
    pub fn new(view: impl Into<String>) -> Self {
        Self::with_defaults(view, &TrackingDefaults::default())
    }

    /// Track `view` starting from application-wide defaults
    pub fn with_defaults(view: impl Into<String>, defaults: &TrackingDefaults) -> Self {
        Self {
            view: view.into(),
            view_method: None,
            mode: TrackingMode::Requests,
            logging_methods: defaults.logging_methods.clone(),
            decision: LogDecision::Default,
            response_capture: ResponseCapture::Structured,
            client_errors: defaults.client_errors,
            persist_failure: defaults.persist_failure,
            max_body_bytes: defaults.max_body_bytes,
            redactor: Redactor::new(&defaults.sensitive_fields),
        }
    }

    pub fn logging_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.logging_methods = LoggingMethods::only(methods);
        self
    }

    /// Add field names to redact (case-insensitive)
    pub fn sensitive_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.redactor.extend(fields);
        self
    }

    /// Replace the default method check with a custom decision
    pub fn should_log_with<F>(mut self, decide: F) -> Self
    where
        F: Fn(&RequestSummary, &ResponseSummary<'_>) -> bool + Send + Sync + 'static,
    {
        self.decision = LogDecision::Custom(Arc::new(decide));
        self
    }

    /// Only record server faults
    pub fn errors_only(mut self) -> Self {
        self.mode = TrackingMode::ErrorsOnly;
        self
    }

    pub fn view_method(mut self, view_method: impl Into<String>) -> Self {
        self.view_method = Some(view_method.into());
        self
    }

    pub fn response_capture(mut self, capture: ResponseCapture) -> Self {
        self.response_capture = capture;
        self
    }

    pub fn client_errors(mut self, policy: ClientErrorPolicy) -> Self {
        self.client_errors = policy;
        self
    }

    pub fn persist_failure(mut self, policy: PersistFailurePolicy) -> Self {
        self.persist_failure = policy;
        self
    }

    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Decide whether this request is logged, given its final response
    pub fn should_log(&self, request: &RequestSummary, response: &ResponseSummary<'_>) -> bool {
        match &self.decision {
            LogDecision::Default => self.logging_methods.allows(&request.method),
            LogDecision::Custom(decide) => decide(request, response),
        }
    }

    /// Requests this route never logs. They bypass capture entirely.
    pub(crate) fn skips(&self, method: &Method) -> bool {
        matches!(self.decision, LogDecision::Default) && !self.logging_methods.allows(method)
    }

    /// The response body is needed to decide or to store it
    pub(crate) fn wants_response_body(&self, is_json: bool) -> bool {
        matches!(self.decision, LogDecision::Custom(_))
            || (self.mode == TrackingMode::Requests
                && self.response_capture == ResponseCapture::Structured
                && is_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method) -> RequestSummary {
        RequestSummary {
            method,
            path: "/".to_string(),
            query: None,
            user_id: None,
        }
    }

    #[test]
    fn test_logging_methods_parse() {
        assert_eq!(LoggingMethods::parse("").unwrap(), LoggingMethods::All);
        assert_eq!(LoggingMethods::parse("__all__").unwrap(), LoggingMethods::All);
        assert_eq!(
            LoggingMethods::parse("post, delete").unwrap(),
            LoggingMethods::Only(vec![Method::POST, Method::DELETE])
        );
        assert!(LoggingMethods::parse("GET, BAD METHOD").is_err());
    }

    #[test]
    fn test_default_decision_uses_methods() {
        let config = TrackingConfig::new("demo").logging_methods([Method::POST]);
        let headers = HeaderMap::new();
        let response = ResponseSummary {
            status: StatusCode::OK,
            headers: &headers,
            body: None,
        };

        assert!(config.should_log(&request(Method::POST), &response));
        assert!(!config.should_log(&request(Method::GET), &response));
    }

    #[test]
    fn test_only_default_decision_skips_methods() {
        let config = TrackingConfig::new("demo").logging_methods([Method::POST]);
        assert!(config.skips(&Method::GET));
        assert!(!config.skips(&Method::POST));

        let custom = config.should_log_with(|_, _| true);
        assert!(!custom.skips(&Method::GET));
    }

    #[test]
    fn test_custom_decision_sees_response_body() {
        let config = TrackingConfig::new("demo")
            .should_log_with(|_, response| response.body.map_or(false, |b| b.contains("log")));
        let headers = HeaderMap::new();

        let logged = ResponseSummary {
            status: StatusCode::OK,
            headers: &headers,
            body: Some("\"with logging\""),
        };
        let skipped = ResponseSummary {
            status: StatusCode::OK,
            headers: &headers,
            body: Some("\"no recording\""),
        };

        assert!(config.should_log(&request(Method::GET), &logged));
        assert!(!config.should_log(&request(Method::GET), &skipped));
        assert!(config.wants_response_body(false));
    }

    #[test]
    fn test_with_defaults_copies_policies() {
        let defaults = TrackingDefaults {
            logging_methods: LoggingMethods::only([Method::PUT]),
            sensitive_fields: vec!["ssn".to_string()],
            max_body_bytes: 10,
            persist_failure: PersistFailurePolicy::Propagate,
            client_errors: ClientErrorPolicy::RecordError,
        };
        let config = TrackingConfig::with_defaults("demo", &defaults);

        assert_eq!(config.logging_methods, LoggingMethods::only([Method::PUT]));
        assert_eq!(config.max_body_bytes, 10);
        assert_eq!(config.persist_failure, PersistFailurePolicy::Propagate);
        assert_eq!(config.client_errors, ClientErrorPolicy::RecordError);
        assert!(config.redactor().is_sensitive("SSN"));
        assert!(config.redactor().is_sensitive("password"));
    }

    #[test]
    fn test_errors_only_never_stores_structured_body() {
        let config = TrackingConfig::new("demo").errors_only();
        assert!(!config.wants_response_body(true));

        let config = TrackingConfig::new("demo");
        assert!(config.wants_response_body(true));
        assert!(!config.wants_response_body(false));
    }
}
