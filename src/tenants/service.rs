use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, info};

use crate::error::GatewayResult;
use crate::gateway::{ApiRequest, Gateway};
use crate::models::tenant::{Listing, Tenant, TenantInput, TenantUser};
use crate::models::CurrentUser;

/// The tenant directory and the switch protocol.
pub struct TenantService {
    gateway: Arc<Gateway>,
}

impl TenantService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Tenants the signed-in user may act as. Cached under `tenants`.
    pub async fn list(&self) -> GatewayResult<Vec<Tenant>> {
        let listing: Listing<Tenant> = self
            .gateway
            .query("tenants", &self.gateway.endpoints().tenants)
            .await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, tenant_id: &str) -> GatewayResult<Tenant> {
        self.gateway
            .get(&self.gateway.endpoints().tenant_detail(tenant_id))
            .await
    }

    /// The backend's idea of the current tenant; any failure reads as "none".
    pub async fn current(&self) -> Option<Tenant> {
        match self
            .gateway
            .query::<Tenant>("currentTenant", &self.gateway.endpoints().tenant_current)
            .await
        {
            Ok(tenant) => Some(tenant),
            Err(e) => {
                debug!("No current tenant: {}", e);
                None
            }
        }
    }

    pub async fn create(&self, input: &TenantInput) -> GatewayResult<Tenant> {
        let tenant = self
            .gateway
            .post(&self.gateway.endpoints().tenants, input)
            .await?;
        self.gateway.cache().invalidate_resource("tenants");
        Ok(tenant)
    }

    pub async fn update(&self, tenant_id: &str, input: &TenantInput) -> GatewayResult<Tenant> {
        let tenant = self
            .gateway
            .patch(&self.gateway.endpoints().tenant_detail(tenant_id), input)
            .await?;
        self.gateway.cache().invalidate_resource("tenants");
        Ok(tenant)
    }

    pub async fn delete(&self, tenant_id: &str) -> GatewayResult<()> {
        self.gateway
            .delete(&self.gateway.endpoints().tenant_detail(tenant_id))
            .await?;
        self.gateway.cache().invalidate_resource("tenants");
        Ok(())
    }

    pub async fn users(&self, tenant_id: &str) -> GatewayResult<Vec<TenantUser>> {
        let listing: Listing<TenantUser> = self
            .gateway
            .query("tenantUsers", &self.gateway.endpoints().tenant_users(tenant_id))
            .await?;
        Ok(listing.into_vec())
    }

    /// Asks the backend to switch tenant, then makes `tenant_id` current.
    ///
    /// A rejected switch leaves the local state untouched. On success cached
    /// reads of the previous tenant are dropped and the user record reloaded.
    pub async fn switch(&self, tenant_id: &str) -> GatewayResult<()> {
        let path = self.gateway.endpoints().tenant_switch_for(tenant_id);
        self.gateway.send(ApiRequest::post(path)).await?;

        let session = self.gateway.session();
        let previous = session.set_tenant(Some(tenant_id.to_string())).await?;
        self.gateway
            .cache()
            .invalidate_for_tenant_switch(previous.as_deref());
        info!(
            event_name = "tenants.switch.succeeded",
            previous = previous.as_deref().unwrap_or("none"),
            current = tenant_id,
            "Switched tenant"
        );

        // The user record carries the tenant; reload it so it matches.
        match self
            .gateway
            .get::<CurrentUser>(&self.gateway.endpoints().me)
            .await
        {
            Ok(user) => session.set_user(user).await?,
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {}
            Err(e) => debug!("Could not reload user after tenant switch: {}", e),
        }
        Ok(())
    }
}
