use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};

/// REST calls go to `api.base_url`, GraphQL calls to `api.graphql_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Rest,
    GraphQl,
}

/// An outgoing call before (and after) decoration.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Relative to the base URL; may carry its own `?query`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub kind: RequestKind,
    /// Set once the request has been resent after a token refresh.
    pub retried: bool,
    /// Cleared for calls whose 401 means "bad credentials", not "expired token"
    /// (login, register, and the refresh call itself).
    pub refresh_on_unauthorized: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            kind: RequestKind::Rest,
            retried: false,
            refresh_on_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn graphql(query: &str, variables: Option<Value>) -> Self {
        let mut body = json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }
        Self {
            kind: RequestKind::GraphQl,
            body: Some(body),
            ..Self::new(Method::POST, "")
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    /// Path without any inline query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    /// Looks in both the explicit query pairs and the inline `?query` of the path.
    pub fn has_query_param(&self, name: &str) -> bool {
        if self.query.iter().any(|(k, _)| k == name) {
            return true;
        }
        match self.path.split_once('?') {
            Some((_, inline)) => inline
                .split('&')
                .any(|pair| pair.split('=').next() == Some(name)),
            None => false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The bearer token currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// What came back from the backend, whatever the status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `Null` for an empty body, a JSON string for non-JSON bodies.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Non-2xx responses become `GatewayError::Api`.
    pub fn into_result(self) -> GatewayResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let body = match self.body {
            Value::Null => None,
            other => Some(other),
        };
        Err(GatewayError::from_status(self.status, body))
    }

    pub fn json<T: DeserializeOwned>(self) -> GatewayResult<T> {
        serde_json::from_value(self.body).map_err(GatewayError::from)
    }
}

/// Interprets a raw body: empty → `Null`, JSON → parsed, anything else → string.
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
