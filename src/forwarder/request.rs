//! The inbound side of one forwarding operation.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;

use crate::backend::ForwardMethod;
use crate::error::AppResult;
use crate::middleware::REQUEST_ID_HEADER;

/// Snapshot of an inbound request, immutable for the whole forward.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Backend endpoint path, e.g. `/bookings/42`
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Route label for metrics
    pub route: &'static str,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            route: "direct",
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn with_route(mut self, route: &'static str) -> Self {
        self.route = route;
        self
    }

    /// Raw `Authorization` header value, if present and non-blank.
    ///
    /// Header lookup is case-insensitive. Presence is decided on the raw
    /// bytes, so a value that is not visible ASCII still counts as a user
    /// credential.
    pub fn user_credential(&self) -> Option<&HeaderValue> {
        self.headers
            .get(AUTHORIZATION)
            .filter(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }

    /// JSON body for methods that carry one.
    ///
    /// An empty or whitespace-only body is `None`; anything else must parse.
    pub fn json_body(&self, method: ForwardMethod) -> AppResult<Option<Value>> {
        if !method.carries_body() || self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.body)?))
    }
}
