use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cached::{Cached, TimedCache};
use serde_json::Value;
use tracing::debug;

use crate::utils::log_throttle::LogThrottle;

const CACHE_HIT_LOG_WINDOW: Duration = Duration::from_secs(30);

/// Resources whose contents depend on the current tenant. All of them are
/// dropped when the tenant changes.
pub const TENANT_SCOPED_RESOURCES: &[&str] = &[
    "products",
    "sales",
    "purchases",
    "customers",
    "vendors",
    "inventory",
    "orders",
    "notifications",
    "tenantUsers",
    "currentTenant",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: String,
    pub tenant_id: Option<String>,
    pub path: String,
}

impl CacheKey {
    pub fn new(resource: &str, tenant_id: Option<&str>, path: &str) -> Self {
        Self {
            resource: resource.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            path: path.to_string(),
        }
    }
}

struct Entries {
    values: TimedCache<CacheKey, Value>,
    /// Every key ever inserted and not yet removed; `TimedCache` cannot be iterated.
    keys: HashSet<CacheKey>,
}

/// Read-through cache for query results, shared by every clone.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<Entries>>,
    hit_log: Arc<LogThrottle>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                values: TimedCache::with_lifespan(ttl.as_secs().max(1)),
                keys: HashSet::new(),
            })),
            hit_log: Arc::new(LogThrottle::new(CACHE_HIT_LOG_WINDOW)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.lock();
        match entries.values.cache_get(key).cloned() {
            Some(value) => {
                if let Some(suppressed) = self.hit_log.admit(&key.resource) {
                    debug!(
                        event_name = "gateway.cache.hit",
                        resource = %key.resource,
                        suppressed,
                        "Query cache hit"
                    );
                }
                Some(value)
            }
            None => {
                // Expired entries are evicted by `cache_get`.
                entries.keys.remove(key);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        let mut entries = self.lock();
        entries.keys.insert(key.clone());
        entries.values.cache_set(key, value);
    }

    /// Removes every entry matching `predicate`; returns how many were removed.
    pub fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let mut entries = self.lock();
        let doomed: Vec<CacheKey> = entries.keys.iter().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            entries.values.cache_remove(key);
            entries.keys.remove(key);
        }
        doomed.len()
    }

    pub fn invalidate_resource(&self, resource: &str) -> usize {
        self.invalidate_where(|k| k.resource == resource)
    }

    /// Drops everything read under `previous` and every tenant-scoped resource.
    pub fn invalidate_for_tenant_switch(&self, previous: Option<&str>) -> usize {
        let removed = self.invalidate_where(|k| {
            k.tenant_id.as_deref() == previous
                || TENANT_SCOPED_RESOURCES.contains(&k.resource.as_str())
        });
        debug!(
            event_name = "gateway.cache.tenant_invalidated",
            removed, "Invalidated cached reads after tenant switch"
        );
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.values.cache_clear();
        entries.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> QueryCache {
        QueryCache::new(Duration::from_secs(300))
    }

    #[test]
    fn test_same_path_is_cached_per_tenant() {
        let cache = cache();
        cache.insert(CacheKey::new("products", Some("a"), "/products/"), json!([1]));

        assert_eq!(
            cache.get(&CacheKey::new("products", Some("a"), "/products/")),
            Some(json!([1]))
        );
        assert_eq!(cache.get(&CacheKey::new("products", Some("b"), "/products/")), None);
    }

    #[test]
    fn test_tenant_switch_invalidation() {
        let cache = cache();
        cache.insert(CacheKey::new("products", Some("a"), "/products/"), json!([1]));
        cache.insert(CacheKey::new("reports", Some("a"), "/reports/"), json!([2]));
        cache.insert(CacheKey::new("sales", None, "/sales/"), json!([3]));
        cache.insert(CacheKey::new("tenants", None, "/tenants/"), json!([4]));

        assert_eq!(cache.invalidate_for_tenant_switch(Some("a")), 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::new("tenants", None, "/tenants/")).is_some());
    }

    #[test]
    fn test_invalidate_resource_and_clear() {
        let cache = cache();
        cache.insert(CacheKey::new("tenants", None, "/tenants/"), json!([]));
        cache.insert(CacheKey::new("currentUser", None, "/users/me/"), json!({}));

        assert_eq!(cache.invalidate_resource("tenants"), 1);
        assert_eq!(cache.invalidate_resource("tenants"), 0);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
