//! Parameter types for outbound backend calls.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::Method;
use serde_json::Value;

use crate::error::AppError;

/// HTTP methods the gateway is willing to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ForwardMethod {
    /// The method as an `http::Method`.
    pub fn as_http(self) -> Method {
        match self {
            ForwardMethod::Get => Method::GET,
            ForwardMethod::Post => Method::POST,
            ForwardMethod::Put => Method::PUT,
            ForwardMethod::Delete => Method::DELETE,
        }
    }

    /// Whether a JSON body is serialized for this method.
    pub fn carries_body(self) -> bool {
        matches!(self, ForwardMethod::Post | ForwardMethod::Put)
    }

    /// Whether inbound query parameters are appended for this method.
    pub fn carries_query(self) -> bool {
        self == ForwardMethod::Get
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForwardMethod::Get => "GET",
            ForwardMethod::Post => "POST",
            ForwardMethod::Put => "PUT",
            ForwardMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ForwardMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&Method> for ForwardMethod {
    type Error = AppError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(ForwardMethod::Get),
            Method::POST => Ok(ForwardMethod::Post),
            Method::PUT => Ok(ForwardMethod::Put),
            Method::DELETE => Ok(ForwardMethod::Delete),
            _ => Err(AppError::MethodNotAllowed(method.to_string())),
        }
    }
}

/// One outbound call to the backend, minus its credential and timeout.
///
/// Query parameters and body are carried as given; whether they are sent is
/// decided by [`ForwardMethod::carries_query`] and
/// [`ForwardMethod::carries_body`].
///
/// # Example
///
/// ```rust,ignore
/// let call = OutboundCall::new(ForwardMethod::Get, "/services")
///     .with_query(&query)
///     .with_request_id(Some("req-123"));
///
/// client.call(&call, proof.as_ref(), Duration::from_secs(5)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OutboundCall<'a> {
    /// Method to use
    pub method: ForwardMethod,
    /// Endpoint path relative to the backend base URL
    pub endpoint: &'a str,
    /// Query parameters (GET only)
    pub query: Option<&'a BTreeMap<String, String>>,
    /// JSON body (POST/PUT only)
    pub body: Option<&'a Value>,
    /// Correlation ID propagated as `X-Request-Id`
    pub request_id: Option<&'a str>,
}

impl<'a> OutboundCall<'a> {
    pub fn new(method: ForwardMethod, endpoint: &'a str) -> Self {
        Self {
            method,
            endpoint,
            query: None,
            body: None,
            request_id: None,
        }
    }

    pub fn with_query(mut self, query: &'a BTreeMap<String, String>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_body(mut self, body: Option<&'a Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<&'a str>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Query parameters that will actually be sent.
    pub fn effective_query(&self) -> Option<&'a BTreeMap<String, String>> {
        self.query
            .filter(|q| self.method.carries_query() && !q.is_empty())
    }

    /// Body that will actually be sent.
    pub fn effective_body(&self) -> Option<&'a Value> {
        self.body.filter(|_| self.method.carries_body())
    }
}
