use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::decorate::decorate;
use super::refresh::TokenRefresher;
use super::request::{ApiRequest, ApiResponse};
use crate::backend::Backend;
use crate::cache::{CacheKey, QueryCache};
use crate::config::{EndpointsConfig, TenancyConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::models::Session;
use crate::session::SessionContext;

/// The authenticated HTTP client every feature module goes through.
///
/// Decorates each request with the bearer token and tenant id, and on a 401
/// refreshes the token (once, shared by all concurrent callers) and resends
/// the request a single time. When the refresh fails the session is cleared
/// and the original 401 is returned.
pub struct Gateway {
    backend: Arc<dyn Backend>,
    session: SessionContext,
    cache: QueryCache,
    tenancy: TenancyConfig,
    endpoints: EndpointsConfig,
    refresher: TokenRefresher,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: SessionContext,
        cache: QueryCache,
        tenancy: TenancyConfig,
        endpoints: EndpointsConfig,
    ) -> Self {
        let refresher = TokenRefresher::new(
            backend.clone(),
            session.clone(),
            cache.clone(),
            endpoints.refresh.clone(),
        );
        Self {
            backend,
            session,
            cache,
            tenancy,
            endpoints,
            refresher,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    pub fn backend_name(&self) -> &str {
        self.backend.get_name()
    }

    /// Refreshes the current access token through the shared refresher.
    pub async fn refresh_session(&self) -> GatewayResult<Session> {
        let current = self.session.access_token().await;
        self.refresher.refresh(current.as_deref()).await
    }

    async fn decorate_and_send(
        &self,
        request: &mut ApiRequest,
        tenant_id: Option<&str>,
    ) -> GatewayResult<(Option<String>, ApiResponse)> {
        let token = self.session.access_token().await;
        decorate(request, token.as_deref(), tenant_id, &self.tenancy);
        let response = self.backend.send(request).await?;
        Ok((token, response))
    }

    /// Sends `request` through the refresh protocol. Non-2xx responses are errors.
    pub async fn send(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        let tenant_id = self.session.tenant_id().await;
        self.send_as(request, tenant_id.as_deref()).await
    }

    /// Both attempts carry `tenant_id`, even if the tenant changes in between.
    async fn send_as(&self, request: ApiRequest, tenant_id: Option<&str>) -> GatewayResult<ApiResponse> {
        let mut request = request;
        let (sent_with, response) = self.decorate_and_send(&mut request, tenant_id).await?;

        if response.status != StatusCode::UNAUTHORIZED
            || request.retried
            || !request.refresh_on_unauthorized
        {
            return response.into_result();
        }

        debug!(
            event_name = "gateway.request.unauthorized",
            method = %request.method,
            path = %request.route(),
            "Received 401, attempting token refresh"
        );
        let original = match response.into_result() {
            Err(e) => e,
            Ok(response) => return Ok(response),
        };

        if let Err(e) = self.refresher.refresh(sent_with.as_deref()).await {
            debug!(
                event_name = "gateway.request.refresh_failed",
                "Refresh failed ({}), returning original error", e
            );
            return Err(original);
        }

        request.retried = true;
        let (_, retry) = self.decorate_and_send(&mut request, tenant_id).await?;
        info!(
            event_name = "gateway.request.retried",
            method = %request.method,
            path = %request.route(),
            status = retry.status.as_u16(),
            "Retried request after token refresh"
        );
        retry.into_result()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<T> {
        let mut request = ApiRequest::get(path);
        for (name, value) in query {
            request = request.with_query(*name, *value);
        }
        self.send(request).await?.json()
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::post(path).with_body(body)).await?.json()
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::put(path).with_body(body)).await?.json()
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::patch(path).with_body(body)).await?.json()
    }

    pub async fn delete(&self, path: &str) -> GatewayResult<()> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Runs a GraphQL operation and decodes its `data` member.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> GatewayResult<T> {
        let response = self.send(ApiRequest::graphql(query, variables)).await?;
        if let Some(errors) = response.body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect();
                return Err(GatewayError::GraphQl(messages.join("; ")));
            }
        }
        let data = response.body.get("data").cloned().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(GatewayError::from)
    }

    /// Cached GET, keyed by resource, current tenant and path.
    pub async fn query<T: DeserializeOwned>(&self, resource: &str, path: &str) -> GatewayResult<T> {
        let tenant_id = self.session.tenant_id().await;
        let key = CacheKey::new(resource, tenant_id.as_deref(), path);
        let value = match self.cache.get(&key) {
            Some(value) => value,
            None => {
                let value = self
                    .send_as(ApiRequest::get(path), tenant_id.as_deref())
                    .await?
                    .body;
                self.cache.insert(key, value.clone());
                value
            }
        };
        serde_json::from_value(value).map_err(GatewayError::from)
    }
}
