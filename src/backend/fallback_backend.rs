use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::Backend;
use crate::error::GatewayResult;
use crate::gateway::request::{ApiRequest, ApiResponse};
use crate::utils::log_throttle::LogThrottle;

const FALLBACK_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Sends through `primary`, and answers from `fallback` whenever the primary
/// cannot be reached. HTTP error statuses from the primary are returned as-is.
pub struct FallbackBackend {
    primary: Arc<dyn Backend>,
    fallback: Arc<dyn Backend>,
    unreachable_log: LogThrottle,
}

impl FallbackBackend {
    pub fn new(primary: Arc<dyn Backend>, fallback: Arc<dyn Backend>) -> Self {
        Self {
            primary,
            fallback,
            unreachable_log: LogThrottle::new(FALLBACK_LOG_INTERVAL),
        }
    }
}

#[async_trait::async_trait]
impl Backend for FallbackBackend {
    fn get_name(&self) -> &str {
        "real+mock-fallback"
    }

    async fn send(&self, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        match self.primary.send(request).await {
            Err(e) if e.is_network() => {
                if let Some(suppressed) = self.unreachable_log.admit(self.primary.get_name()) {
                    warn!(
                        event_name = "gateway.backend.fallback",
                        suppressed, "{} unreachable, answering from {}: {}",
                        self.primary.get_name(),
                        self.fallback.get_name(),
                        e
                    );
                }
                self.fallback.send(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, RealBackend};
    use crate::config::{ApiConfig, EndpointsConfig};
    use http::StatusCode;
    use mockito::Server;

    fn mock() -> Arc<dyn Backend> {
        Arc::new(MockBackend::new(EndpointsConfig::default(), Default::default()))
    }

    fn real(url: &str) -> Arc<dyn Backend> {
        Arc::new(
            RealBackend::new(&ApiConfig {
                base_url: url.to_string(),
                timeout_in_ms: 2_000,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_unreachable_primary_uses_fallback() {
        let backend = FallbackBackend::new(real("http://127.0.0.1:9"), mock());
        let response = backend
            .send(&ApiRequest::get("/health-check/"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["version"], "mock");
    }

    #[tokio::test]
    async fn test_error_status_from_primary_is_kept() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/health-check/")
            .with_status(503)
            .create_async()
            .await;

        let backend = FallbackBackend::new(real(&server.url()), mock());
        let response = backend
            .send(&ApiRequest::get("/health-check/"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
