#![allow(dead_code)]

use chrono::Utc;
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use mangogate::config::{extract_config, ConfigV1};
use mangogate::models::{CurrentUser, Session};
use mangogate::store::{keys, Store};
use mangogate::{build_client, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Parses a YAML config the way the binary does, minus the env layer.
pub fn parse_config(yaml: &str) -> ConfigV1 {
    extract_config(
        Figment::new()
            .join(Serialized::default("version", "1.0.0"))
            .merge(Yaml::string(yaml)),
    )
    .expect("test config should parse")
}

/// A real-backend config pointed at a mockito server.
pub fn config_for(server_url: &str) -> ConfigV1 {
    parse_config(&format!(
        r#"
version: "1.0.0"
api:
  base_url: "{url}/api"
  graphql_url: "{url}/graphql"
  timeout_in_ms: 3000
logging:
  level: debug
"#,
        url = server_url
    ))
}

pub async fn client_for(server_url: &str) -> Client {
    build_client(&config_for(server_url))
        .await
        .expect("client should build")
}

/// A JWT access token expiring `exp_in` seconds from now.
pub fn access_token(sub: &str, exp_in: i64) -> String {
    encode(
        &Header::default(),
        &Claims {
            sub: sub.to_string(),
            exp: Utc::now().timestamp() + exp_in,
        },
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("JWT should encode")
}

pub fn user(tenant_id: &str) -> CurrentUser {
    CurrentUser {
        id: "1".to_string(),
        username: "admin".to_string(),
        email: "admin@example.com".to_string(),
        tenant_id: Some(tenant_id.to_string()),
        roles: vec!["admin".to_string()],
        ..Default::default()
    }
}

/// Puts the client in a signed-in state without going through login.
pub async fn sign_in(client: &Client, access: &str, refresh: Option<&str>, tenant_id: Option<&str>) {
    let session = client.gateway.session();
    session
        .start_session(
            Session::new(access.to_string(), refresh.map(str::to_string)),
            tenant_id.map(user),
        )
        .await
        .expect("session should start");
    if let Some(tenant_id) = tenant_id {
        session
            .set_tenant(Some(tenant_id.to_string()))
            .await
            .expect("tenant should be set");
    }
}

pub async fn stored_keys(store: &dyn Store) -> Vec<(&'static str, Option<String>)> {
    let mut values = Vec::new();
    for key in keys::ALL {
        values.push((key, store.get(key).await.expect("store read")));
    }
    values
}
