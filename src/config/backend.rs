use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which backend the gateway talks to. Chosen once at startup.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "real")]
    Real(RealBackendConfig),
    #[serde(rename = "mock")]
    Mock(MockBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Real(RealBackendConfig::default())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(default)]
pub struct RealBackendConfig {
    /// Answer from the in-memory mock when the real backend is unreachable.
    /// Development aid only.
    pub fallback_to_mock: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(default)]
pub struct MockBackendConfig {
    /// Simulated round-trip latency for every mock call.
    pub latency_ms: u64,
}
