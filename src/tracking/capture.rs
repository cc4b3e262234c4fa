//! Extraction of request attributes and payloads

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderMap, Uri};
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{is_url_shaped_host, truncate, MAX_PATH_LEN, MAX_REQUEST_ID_LEN};

use super::redact::Redactor;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Client address: first valid `X-Forwarded-For` entry, else the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .and_then(parse_ip);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Originating host: the Host header, else the URI authority, else
/// `localhost`. Values that are not URL hosts are skipped.
pub fn host(headers: &HeaderMap, uri: &Uri) -> String {
    let from_header = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|v| truncate(v.trim(), MAX_PATH_LEN));
    let from_uri = uri
        .authority()
        .map(|a| truncate(a.as_str(), MAX_PATH_LEN));

    from_header
        .into_iter()
        .chain(from_uri)
        .find(|candidate| is_url_shaped_host(candidate))
        .unwrap_or_else(|| {
            debug!("No usable host on request, recording localhost");
            "localhost".to_string()
        })
}

pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| truncate(v, MAX_REQUEST_ID_LEN))
}

/// Serialized, redacted query parameters; a repeated key keeps its last value
pub fn query_params(query: Option<&str>, redactor: &Redactor) -> Option<String> {
    let query = query.filter(|q| !q.is_empty())?;

    let params: Map<String, Value> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();

    serialize(redactor.clean(Value::Object(params)))
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
}

pub fn is_json(headers: &HeaderMap) -> bool {
    media_type(headers).map_or(false, |m| m == "application/json" || m.ends_with("+json"))
}

fn is_form(headers: &HeaderMap) -> bool {
    media_type(headers).map_or(false, |m| m == "application/x-www-form-urlencoded")
}

/// Parse a request body by its content type. Malformed or unsupported
/// payloads yield `None`.
pub fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }

    if is_json(headers) {
        return match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Request body is not valid JSON: {}", e);
                None
            }
        };
    }

    if is_form(headers) {
        let form: Map<String, Value> = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Some(Value::Object(form));
    }

    debug!(content_type = ?media_type(headers), "Request body not captured");
    None
}

pub fn serialize(value: Value) -> Option<String> {
    serde_json::to_string(&value).ok()
}

/// Read `body` into memory when its size is known to be at most `max` bytes.
///
/// Returns a body carrying the same bytes for the next consumer, plus the
/// bytes themselves when they were buffered.
pub async fn buffer_body(body: Body, max: usize) -> Result<(Body, Option<Bytes>), axum::Error> {
    let within_limit = body
        .size_hint()
        .upper()
        .map_or(false, |upper| upper <= max as u64);

    if !within_limit {
        return Ok((body, None));
    }

    let bytes = body.collect().await?.to_bytes();
    Ok((Body::from(bytes.clone()), Some(bytes)))
}
