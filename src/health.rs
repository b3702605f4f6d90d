//! Connectivity probe for the backend API.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::gateway::request::parse_body;

pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_PATH: &str = "/health-check/";

/// Outcome of a health probe, with a human-readable diagnosis.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiHealth {
    pub is_available: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ApiHealth {
    fn unavailable(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            is_available: false,
            message: message.into(),
            details: Some(details.into()),
            version: None,
        }
    }
}

pub async fn check_api_health(base_url: &str) -> ApiHealth {
    check_api_health_at(base_url, DEFAULT_HEALTH_PATH, HEALTH_CHECK_TIMEOUT).await
}

/// Probes `{base_url}{health_path}`; a 404 there falls back to the API root.
pub async fn check_api_health_at(base_url: &str, health_path: &str, timeout: Duration) -> ApiHealth {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => return ApiHealth::unavailable("Could not build HTTP client", e.to_string()),
    };
    let base = base_url.trim_end_matches('/');
    let url = format!("{}/{}", base, health_path.trim_start_matches('/'));
    debug!("Probing API health at {}", url);

    let response = match client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return diagnose_transport_error(&e),
    };

    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await.map(|b| parse_body(&b)).unwrap_or(Value::Null);
        let version = body
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);
        return ApiHealth {
            is_available: true,
            message: "Connected to API successfully".to_string(),
            details: Some(format!(
                "Status: {}, API version: {}",
                status.as_u16(),
                version.as_deref().unwrap_or("unknown")
            )),
            version,
        };
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        let root_ok = client
            .get(base)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        if root_ok {
            return ApiHealth {
                is_available: true,
                message: "Connected to API root successfully".to_string(),
                details: Some(
                    "Health check endpoint not found, but API root is accessible".to_string(),
                ),
                version: None,
            };
        }
        return ApiHealth::unavailable(
            "API health check endpoint not found",
            "The API is running but the health-check endpoint is not implemented",
        );
    }

    let body = response.bytes().await.map(|b| parse_body(&b)).unwrap_or(Value::Null);
    let details = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    ApiHealth::unavailable(format!("API error: {}", status.as_u16()), details)
}

fn diagnose_transport_error(e: &reqwest::Error) -> ApiHealth {
    if e.is_timeout() {
        ApiHealth::unavailable(
            "Connection timed out",
            "The API server took too long to respond",
        )
    } else if e.is_connect() {
        ApiHealth::unavailable(
            "Connection refused. Is the backend server running?",
            e.to_string(),
        )
    } else {
        ApiHealth::unavailable("Network error when connecting to API", e.to_string())
    }
}
