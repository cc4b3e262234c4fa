use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{Result, TrackingError};

use super::UserSummary;

/// Maximum stored length of `path`, `view` and `view_method`
pub const MAX_PATH_LEN: usize = 200;
/// Maximum stored length of `request_id`
pub const MAX_REQUEST_ID_LEN: usize = 100;
/// Maximum stored length of `method`
pub const MAX_METHOD_LEN: usize = 10;

/// How much of a response was served from cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum CacheUsage {
    AllFromCache,
    PartFromCache,
    NoneFromCache,
}

impl CacheUsage {
    pub fn as_i16(&self) -> i16 {
        match self {
            CacheUsage::AllFromCache => 100,
            CacheUsage::PartFromCache => 50,
            CacheUsage::NoneFromCache => 0,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            100 => Some(CacheUsage::AllFromCache),
            50 => Some(CacheUsage::PartFromCache),
            0 => Some(CacheUsage::NoneFromCache),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CacheUsage::AllFromCache => "All data was given from cache",
            CacheUsage::PartFromCache => "Part of data was given from cache",
            CacheUsage::NoneFromCache => "Nothing was given from cache",
        }
    }
}

impl From<CacheUsage> for i16 {
    fn from(value: CacheUsage) -> Self {
        value.as_i16()
    }
}

impl TryFrom<i16> for CacheUsage {
    type Error = String;

    fn try_from(value: i16) -> std::result::Result<Self, Self::Error> {
        CacheUsage::from_i16(value).ok_or_else(|| format!("invalid cache usage: {}", value))
    }
}

/// Persisted API request log
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiRequestLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub request_id: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub response_ms: i32,
    pub path: String,
    pub view: String,
    pub view_method: String,
    pub remote_addr: String,
    pub host: String,
    pub method: String,
    pub query_params: Option<String>,
    pub data: Option<String>,
    pub response: Option<String>,
    pub kind_of_cache_using: Option<i16>,
    pub errors: Option<String>,
    pub status_code: Option<i32>,
}

impl ApiRequestLog {
    /// Get the cache usage enum
    pub fn cache_usage(&self) -> Option<CacheUsage> {
        self.kind_of_cache_using.and_then(CacheUsage::from_i16)
    }
}

impl std::fmt::Display for ApiRequestLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Request log with its user relation already resolved
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogWithUser {
    #[serde(flatten)]
    pub log: ApiRequestLog,
    pub user: Option<UserSummary>,
}

/// Row shape of the `api_request_logs LEFT JOIN users` listing query
#[derive(Debug, Clone, FromRow)]
pub struct RequestLogRow {
    #[sqlx(flatten)]
    pub log: ApiRequestLog,
    pub username: Option<String>,
}

impl From<RequestLogRow> for RequestLogWithUser {
    fn from(row: RequestLogRow) -> Self {
        let user = match (row.log.user_id, row.username) {
            (Some(id), Some(username)) => Some(UserSummary { id, username }),
            _ => None,
        };

        Self { log: row.log, user }
    }
}

/// A request log captured in memory, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequestLog {
    pub user_id: Option<i64>,
    pub request_id: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub response_ms: i32,
    pub path: String,
    pub view: String,
    pub view_method: String,
    pub remote_addr: String,
    pub host: String,
    pub method: String,
    pub query_params: Option<String>,
    pub data: Option<String>,
    pub response: Option<String>,
    pub kind_of_cache_using: Option<CacheUsage>,
    pub errors: Option<String>,
    pub status_code: Option<i32>,
}

impl NewRequestLog {
    /// Start a capture at `requested_at`; remaining fields are filled in as the
    /// request progresses.
    pub fn started(requested_at: DateTime<Utc>, method: &str, path: &str) -> Self {
        Self {
            user_id: None,
            request_id: None,
            requested_at,
            response_ms: 0,
            path: truncate(path, MAX_PATH_LEN),
            view: String::new(),
            view_method: method.to_lowercase(),
            remote_addr: String::new(),
            host: String::new(),
            method: truncate(method, MAX_METHOD_LEN),
            query_params: None,
            data: None,
            response: None,
            kind_of_cache_using: None,
            errors: None,
            status_code: None,
        }
    }

    /// Check column constraints before insertion
    pub fn validate(&self) -> Result<()> {
        if self.response_ms < 0 {
            return Err(TrackingError::InvalidRequest(
                "response_ms must not be negative".into(),
            ));
        }

        if self.remote_addr.parse::<IpAddr>().is_err() {
            return Err(TrackingError::InvalidRequest(format!(
                "remote_addr is not a valid IP address: {}",
                self.remote_addr
            )));
        }

        if !is_url_shaped_host(&self.host) {
            return Err(TrackingError::InvalidRequest(format!(
                "host is not a valid URL host: {}",
                self.host
            )));
        }

        if self.method.is_empty() || self.method.len() > MAX_METHOD_LEN {
            return Err(TrackingError::InvalidRequest(format!(
                "invalid HTTP method: {}",
                self.method
            )));
        }

        if matches!(self.status_code, Some(code) if code < 0) {
            return Err(TrackingError::InvalidRequest(
                "status_code must not be negative".into(),
            ));
        }

        Ok(())
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Whether `host` parses as the host part of a URL
pub fn is_url_shaped_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }

    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    url::Url::parse(&candidate)
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}

/// Request log list query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RequestLogListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<i64>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub view: Option<String>,
    pub status_code: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl RequestLogListParams {
    /// Check whether a record passes every filter set on these params
    pub fn matches(&self, log: &ApiRequestLog) -> bool {
        if let Some(user_id) = self.user_id {
            if log.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(ref method) = self.method {
            if !method.is_empty() && !log.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(ref path) = self.path {
            if !path.is_empty() && &log.path != path {
                return false;
            }
        }
        if let Some(ref view) = self.view {
            if !view.is_empty() && &log.view != view {
                return false;
            }
        }
        if let Some(status_code) = self.status_code {
            if log.status_code != Some(status_code) {
                return false;
            }
        }
        if let Some(start_time) = self.start_time {
            if log.requested_at < start_time {
                return false;
            }
        }
        if let Some(end_time) = self.end_time {
            if log.requested_at > end_time {
                return false;
            }
        }
        true
    }
}
