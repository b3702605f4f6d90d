use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::error::GatewayError;

/// Storage keys for the persisted session.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "starmango_access_token";
    pub const REFRESH_TOKEN: &str = "starmango_refresh_token";
    pub const CURRENT_USER: &str = "starmango_current_user";
    pub const CURRENT_TENANT: &str = "starmango_current_tenant";

    pub const ALL: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, CURRENT_USER, CURRENT_TENANT];
}

/// Key/value storage backing the session context. Each operation is atomic per key.
#[async_trait]
pub trait Store: Send + Sync {
    fn get_name(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
    async fn remove(&self, key: &str) -> Result<(), GatewayError>;
    /// Whether values survive a process restart.
    fn is_persistent(&self) -> bool {
        false
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
/// If `store.enabled = false`, returns a MemoryStore. Otherwise, opens the configured backend.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn Store>, GatewayError> {
    if !config.enabled {
        info!("Session persistence is disabled. Using MemoryStore.");
        return Ok(Arc::new(MemoryStore::new()));
    }

    match &config.backend {
        Some(StoreBackend::File(file_config)) => {
            let store = FileStore::open(&file_config.path).await?;
            info!("Opened file store at {}", file_config.path.display());
            Ok(Arc::new(store))
        }
        None => Err(GatewayError::Config(
            "Store is enabled, but no backend config is provided".to_string(),
        )),
    }
}
