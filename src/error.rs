//! Error type shared by every layer of the gateway.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced to callers of the gateway and its services.
///
/// The type is `Clone` because a single in-flight token refresh hands the same
/// outcome to every request waiting on it.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No response was received (connection refused, timeout, DNS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: StatusCode,
        message: String,
        body: Option<Value>,
    },

    /// The GraphQL endpoint answered with an `errors` payload.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Builds an `Api` error from a status and the (possibly empty) response body.
    ///
    /// Django REST Framework reports errors under `detail`; the rest of the
    /// backend uses `message`. Falls back to the canonical status reason.
    pub fn from_status(status: StatusCode, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| {
                b.get("message")
                    .or_else(|| b.get("detail"))
                    .or_else(|| b.get("error"))
            })
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("An error occurred")
                    .to_string()
            });
        GatewayError::Api {
            status,
            message,
            body,
        }
    }

    /// The HTTP status of the failure, if the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Decode(e.to_string())
    }
}
