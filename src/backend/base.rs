use std::sync::Arc;

use tracing::info;

use super::{fallback_backend::FallbackBackend, mock_backend::MockBackend, real_backend::RealBackend};
use crate::config::{ApiConfig, BackendConfig, EndpointsConfig, MockBackendConfig, TenancyConfig};
use crate::error::GatewayResult;
use crate::gateway::request::{ApiRequest, ApiResponse};

/// Transport to the ERP backend. Receives fully decorated requests and
/// returns the response whatever its status; only transport failures are errors.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    fn get_name(&self) -> &str;
    async fn send(&self, request: &ApiRequest) -> GatewayResult<ApiResponse>;
}

/// Create the backend selected in the config. Called once at startup.
pub fn create_backend(
    config: &BackendConfig,
    api: &ApiConfig,
    endpoints: &EndpointsConfig,
    tenancy: &TenancyConfig,
) -> GatewayResult<Arc<dyn Backend>> {
    let mock = |mock: MockBackendConfig| {
        MockBackend::new(endpoints.clone(), mock).with_tenant_header(tenancy.header_name.clone())
    };
    match config {
        BackendConfig::Real(real) => {
            let backend = RealBackend::new(api)?;
            if real.fallback_to_mock {
                info!("Using real backend at {} with mock fallback", api.base_url);
                Ok(Arc::new(FallbackBackend::new(
                    Arc::new(backend),
                    Arc::new(mock(MockBackendConfig::default())),
                )))
            } else {
                info!("Using real backend at {}", api.base_url);
                Ok(Arc::new(backend))
            }
        }
        BackendConfig::Mock(config) => {
            info!("Using in-memory mock backend");
            Ok(Arc::new(mock(config.clone())))
        }
    }
}
