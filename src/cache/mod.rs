pub mod query_cache;

pub use query_cache::{CacheKey, QueryCache, TENANT_SCOPED_RESOURCES};
