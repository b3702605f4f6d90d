use std::time::Duration;

use http::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::debug;

use super::Backend;
use crate::config::ApiConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::request::{parse_body, ApiRequest, ApiResponse, RequestKind};

/// Talks HTTP to the Django backend.
pub struct RealBackend {
    client: reqwest::Client,
    base_url: String,
    graphql_url: String,
}

impl RealBackend {
    pub fn new(config: &ApiConfig) -> GatewayResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .default_headers(default_headers)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            graphql_url: config.graphql_url.clone(),
        })
    }

    pub fn url_for(&self, request: &ApiRequest) -> String {
        match request.kind {
            RequestKind::GraphQl => self.graphql_url.clone(),
            RequestKind::Rest if request.path.starts_with('/') => {
                format!("{}{}", self.base_url, request.path)
            }
            RequestKind::Rest => format!("{}/{}", self.base_url, request.path),
        }
    }
}

#[async_trait::async_trait]
impl Backend for RealBackend {
    fn get_name(&self) -> &str {
        "real"
    }

    async fn send(&self, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        let url = self.url_for(request);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("{} {}: {}", request.method, url, e)))?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(format!("Failed to read response body: {}", e)))?;

        debug!("{} {} -> {}", request.method, url, status);
        Ok(ApiResponse {
            status,
            headers,
            body: parse_body(&bytes),
        })
    }
}
