//! Wires the gateway and its services together from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::AuthService;
use crate::backend::create_backend;
use crate::cache::QueryCache;
use crate::config::ConfigV1;
use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::session::SessionContext;
use crate::store::create_store;
use crate::tenants::TenantService;

/// Everything a caller needs, sharing one session and one gateway.
pub struct Client {
    pub gateway: Arc<Gateway>,
    pub auth: AuthService,
    pub tenants: TenantService,
}

/// Builds the client described by `config`.
///
/// The token store is opened and any persisted session restored, the backend
/// variant is chosen once here, and the query cache gets its lifespan.
///
/// # Errors
///
/// Fails when the store cannot be opened or read, or the backend cannot be
/// constructed from the configuration.
pub async fn build_client(config: &ConfigV1) -> GatewayResult<Client> {
    let store = create_store(&config.store).await?;
    let session = SessionContext::restore(store).await?;
    let backend = create_backend(
        &config.backend,
        &config.api,
        &config.endpoints,
        &config.tenancy,
    )?;
    let cache = QueryCache::new(Duration::from_secs(config.cache.ttl_secs));

    let gateway = Arc::new(Gateway::new(
        backend,
        session,
        cache,
        config.tenancy.clone(),
        config.endpoints.clone(),
    ));
    info!(
        backend = gateway.backend_name(),
        base_url = %config.api.base_url,
        "Gateway ready"
    );

    Ok(Client {
        auth: AuthService::new(gateway.clone(), &config.auth),
        tenants: TenantService::new(gateway.clone()),
        gateway,
    })
}
