use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::backend::BackendConfig;
use super::logging::LoggingConfig;
use super::store::StoreConfig;
use crate::error::GatewayError;

/// Prefix for environment overrides, e.g. `MANGOGATE_API__BASE_URL`.
pub const ENV_PREFIX: &str = "MANGOGATE_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0. Every section has defaults, so an empty file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub tenancy: TenancyConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Builds the layered figment: defaults, then the YAML file, then `MANGOGATE_*` env vars.
pub fn figment(path: impl AsRef<Path>) -> Figment {
    Figment::new()
        .join(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from the given YAML file (missing file means all defaults).
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, GatewayError> {
    extract_config(figment(path))
}

pub fn extract_config(figment: Figment) -> Result<ConfigV1, GatewayError> {
    let config = figment
        .extract::<Config>()
        .map_err(|e| GatewayError::Config(e.to_string()))?;
    match config {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// The JSON schema for the configuration, pretty printed.
pub fn schema_json() -> Result<String, serde_json::Error> {
    let schema = schema_for!(Config);
    serde_json::to_string_pretty(&schema)
}

/// Where the backend lives.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub graphql_url: String,
    pub timeout_in_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            graphql_url: "http://localhost:8000/graphql".to_string(),
            timeout_in_ms: 10_000,
        }
    }
}

/// Backend endpoint paths, relative to `api.base_url`.
///
/// `tenant_switch` contains an `{id}` placeholder.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
    pub password_reset: String,
    pub password_reset_confirm: String,
    pub password_change: String,
    pub tenants: String,
    pub tenant_switch: String,
    pub tenant_current: String,
    pub health: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: "/auth/login/".to_string(),
            register: "/auth/register/".to_string(),
            refresh: "/auth/token/refresh/".to_string(),
            logout: "/auth/logout/".to_string(),
            me: "/users/me/".to_string(),
            password_reset: "/auth/password-reset/".to_string(),
            password_reset_confirm: "/auth/password-reset/confirm/".to_string(),
            password_change: "/auth/password-change/".to_string(),
            tenants: "/tenants/".to_string(),
            tenant_switch: "/tenants/{id}/switch/".to_string(),
            tenant_current: "/tenants/current/".to_string(),
            health: "/health-check/".to_string(),
        }
    }
}

impl EndpointsConfig {
    pub fn tenant_switch_for(&self, tenant_id: &str) -> String {
        self.tenant_switch.replace("{id}", tenant_id)
    }

    /// `/tenants/{id}/` built from the tenants collection path.
    pub fn tenant_detail(&self, tenant_id: &str) -> String {
        format!("{}/{}/", self.tenants.trim_end_matches('/'), tenant_id)
    }

    pub fn tenant_users(&self, tenant_id: &str) -> String {
        format!("{}users/", self.tenant_detail(tenant_id))
    }
}

/// How the current tenant travels with each request.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct TenancyConfig {
    pub send_header: bool,
    pub header_name: String,
    /// REST calls only; GraphQL calls never get the query parameter.
    pub send_query_param: bool,
    pub query_param_name: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            send_header: true,
            header_name: "X-Tenant-ID".to_string(),
            send_query_param: true,
            query_param_name: "tenant_id".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct AuthConfig {
    /// An access token expiring within this many seconds is refreshed proactively.
    pub refresh_leeway_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_leeway_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, StoreBackend};

    const TEST_CONFIG: &str = r#"
version: "1.0.0"
api:
  base_url: "https://erp.example.com/api"
endpoints:
  refresh: "/auth/refresh/"
tenancy:
  send_query_param: false
backend:
  type: mock
  latency_ms: 5
store:
  enabled: true
  type: file
  path: /tmp/mangogate-session.json
logging:
  level: debug
  format: json
"#;

    fn parse(yaml: &str) -> ConfigV1 {
        extract_config(
            Figment::new()
                .join(Serialized::default("version", "1.0.0"))
                .merge(Yaml::string(yaml)),
        )
        .expect("config should parse")
    }

    #[test]
    fn test_full_config_parses() {
        let config = parse(TEST_CONFIG);
        assert_eq!(config.api.base_url, "https://erp.example.com/api");
        assert_eq!(config.api.graphql_url, "http://localhost:8000/graphql");
        assert_eq!(config.endpoints.refresh, "/auth/refresh/");
        assert_eq!(config.endpoints.login, "/auth/login/");
        assert!(!config.tenancy.send_query_param);
        assert!(config.tenancy.send_header);
        assert!(matches!(
            config.backend,
            BackendConfig::Mock(ref m) if m.latency_ms == 5
        ));
        assert!(config.store.enabled);
        assert!(matches!(config.store.backend, Some(StoreBackend::File(_))));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.service_name, "mangogate");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("{}");
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert!(matches!(config.backend, BackendConfig::Real(_)));
        assert!(!config.store.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.tenancy.header_name, "X-Tenant-ID");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let result = extract_config(Figment::new().merge(Yaml::string("version: \"9.9.9\"")));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_endpoint_helpers() {
        let endpoints = EndpointsConfig::default();
        assert_eq!(endpoints.tenant_switch_for("42"), "/tenants/42/switch/");
        assert_eq!(endpoints.tenant_detail("42"), "/tenants/42/");
        assert_eq!(endpoints.tenant_users("42"), "/tenants/42/users/");
    }

    #[test]
    fn test_schema_renders() {
        let schema = schema_json().expect("schema should serialize");
        assert!(schema.contains(r#""title": "Config""#));
        assert!(schema.contains(r#""api""#));
        assert!(schema.contains(r#""tenancy""#));
    }
}
