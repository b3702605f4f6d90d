use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use http::{Method, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::Backend;
use crate::config::{EndpointsConfig, MockBackendConfig, TenancyConfig};
use crate::error::GatewayResult;
use crate::gateway::request::{ApiRequest, ApiResponse, RequestKind};

const ACCESS_TOKEN_TTL_SECS: i64 = 300;
const SIGNING_SECRET: &[u8] = b"mangogate-mock-backend";

/// A request as the mock saw it, for assertions in tests and demos.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub tenant_header: Option<String>,
}

struct MockUser {
    id: String,
    username: String,
    email: String,
    password: String,
    roles: Vec<String>,
    tenant_ids: Vec<String>,
}

impl MockUser {
    fn to_json(&self, current_tenant: Option<&String>) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "roles": self.roles,
            "tenant_id": current_tenant.or_else(|| self.tenant_ids.first()),
        })
    }
}

#[derive(Default)]
struct MockData {
    tenants: Vec<Value>,
    users: Vec<MockUser>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    /// user id -> tenant id
    current_tenant: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
}

impl MockData {
    fn seeded() -> Self {
        MockData {
            tenants: vec![json!({
                "id": "1",
                "name": "Demo Tenant",
                "domain": "demo.example.com",
                "isActive": true,
                "createdAt": Utc::now().to_rfc3339(),
            })],
            users: vec![MockUser {
                id: "1".to_string(),
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                password: "admin".to_string(),
                roles: vec!["admin".to_string()],
                tenant_ids: vec!["1".to_string()],
            }],
            ..Default::default()
        }
    }

    fn user(&self, id: &str) -> Option<&MockUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn tenant(&self, id: &str) -> Option<&Value> {
        self.tenants.iter().find(|t| t["id"] == id)
    }

    fn issue_tokens(&mut self, user_id: &str) -> (String, String) {
        let access = mint_access_token(user_id);
        let refresh = uuid::Uuid::new_v4().to_string();
        self.access_tokens.insert(access.clone(), user_id.to_string());
        self.refresh_tokens.insert(refresh.clone(), user_id.to_string());
        (access, refresh)
    }
}

#[derive(Serialize)]
struct MockClaims<'a> {
    sub: &'a str,
    jti: String,
    exp: i64,
}

fn mint_access_token(user_id: &str) -> String {
    let claims = MockClaims {
        sub: user_id,
        jti: uuid::Uuid::new_v4().to_string(),
        exp: Utc::now().timestamp() + ACCESS_TOKEN_TTL_SECS,
    };
    // HS256 with a static key cannot fail; fall back to an opaque token regardless.
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SIGNING_SECRET))
        .unwrap_or_else(|_| format!("mock-access-{}", claims.jti))
}

/// Matches `path` against a template containing one `{id}` placeholder.
fn match_template(template: &str, path: &str) -> Option<String> {
    let (prefix, suffix) = template.split_once("{id}")?;
    let id = path.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if id.is_empty() || id.contains('/') {
        None
    } else {
        Some(id.to_string())
    }
}

fn status(code: StatusCode, body: Value) -> ApiResponse {
    ApiResponse::new(code, body)
}

fn unauthorized() -> ApiResponse {
    status(
        StatusCode::UNAUTHORIZED,
        json!({"detail": "Authentication credentials were not provided or have expired."}),
    )
}

fn body_str<'a>(request: &'a ApiRequest, field: &str) -> Option<&'a str> {
    request.body.as_ref()?.get(field)?.as_str()
}

/// In-memory stand-in for the ERP backend: a demo tenant, an admin user
/// (`admin@example.com` / `admin`), the auth and tenant endpoints, and a
/// generic answer for every other path.
pub struct MockBackend {
    endpoints: EndpointsConfig,
    tenant_header: String,
    latency: Duration,
    data: Mutex<MockData>,
}

impl MockBackend {
    pub fn new(endpoints: EndpointsConfig, config: MockBackendConfig) -> Self {
        Self {
            endpoints,
            tenant_header: TenancyConfig::default().header_name,
            latency: Duration::from_millis(config.latency_ms),
            data: Mutex::new(MockData::seeded()),
        }
    }

    /// Reads the tenant id from `name` instead of the default header.
    pub fn with_tenant_header(mut self, name: impl Into<String>) -> Self {
        self.tenant_header = name.into();
        self
    }

    /// Invalidates every issued access token, as if they had all expired.
    pub async fn expire_access_tokens(&self) {
        self.data.lock().await.access_tokens.clear();
    }

    /// Invalidates every issued refresh token.
    pub async fn revoke_refresh_tokens(&self) {
        self.data.lock().await.refresh_tokens.clear();
    }

    pub async fn add_tenant(&self, id: &str, name: &str, member_username: &str) {
        let mut data = self.data.lock().await;
        data.tenants.push(json!({"id": id, "name": name, "isActive": true}));
        if let Some(user) = data.users.iter_mut().find(|u| u.username == member_username) {
            user.tenant_ids.push(id.to_string());
        }
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.data.lock().await.requests.clone()
    }

    /// Number of recorded calls to `path` (query string ignored).
    pub async fn count(&self, method: Method, path: &str) -> usize {
        self.data
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn route(&self, data: &mut MockData, request: &ApiRequest) -> ApiResponse {
        let path = request.route();
        let endpoints = &self.endpoints;

        if request.kind == RequestKind::GraphQl {
            return self.graphql(data, request);
        }

        match request.method {
            Method::GET if path == endpoints.health => {
                return ApiResponse::ok(json!({"status": "ok", "version": "mock"}))
            }
            Method::POST if path == endpoints.login => return self.login(data, request),
            Method::POST if path == endpoints.register => return self.register(data, request),
            Method::POST if path == endpoints.refresh => return self.refresh(data, request),
            Method::POST
                if path == endpoints.password_reset || path == endpoints.password_reset_confirm =>
            {
                return ApiResponse::ok(json!({"success": true}))
            }
            _ => {}
        }

        // Everything below needs a valid access token.
        let Some(user_id) = request
            .bearer_token()
            .and_then(|t| data.access_tokens.get(t))
            .cloned()
        else {
            return unauthorized();
        };

        if request.method == Method::POST && path == endpoints.logout {
            if let Some(refresh) = body_str(request, "refresh") {
                data.refresh_tokens.remove(refresh);
            }
            return ApiResponse::ok(json!({"success": true}));
        }
        if request.method == Method::POST && path == endpoints.password_change {
            return ApiResponse::ok(json!({"success": true}));
        }
        if request.method == Method::GET && path == endpoints.me {
            return match data.user(&user_id) {
                Some(user) => ApiResponse::ok(user.to_json(data.current_tenant.get(&user_id))),
                None => unauthorized(),
            };
        }
        if let Some(tenant_id) = match_template(&endpoints.tenant_switch, path) {
            if request.method == Method::POST {
                return self.switch_tenant(data, &user_id, &tenant_id);
            }
        }
        if let Some(rest) = path.strip_prefix(endpoints.tenants.as_str()) {
            return self.tenants(data, request, &user_id, rest);
        }

        self.generic(request)
    }

    fn login(&self, data: &mut MockData, request: &ApiRequest) -> ApiResponse {
        let login = body_str(request, "email").or_else(|| body_str(request, "username"));
        let password = body_str(request, "password");
        let user_id = data
            .users
            .iter()
            .find(|u| Some(u.email.as_str()) == login || Some(u.username.as_str()) == login)
            .filter(|u| Some(u.password.as_str()) == password)
            .map(|u| u.id.clone());

        let Some(user_id) = user_id else {
            return status(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "No active account found with the given credentials"}),
            );
        };
        if let Some(tenant_id) = body_str(request, "tenant_id") {
            data.current_tenant
                .insert(user_id.clone(), tenant_id.to_string());
        }
        let (access, refresh) = data.issue_tokens(&user_id);
        let user = data
            .user(&user_id)
            .map(|u| u.to_json(data.current_tenant.get(&user_id)))
            .unwrap_or(Value::Null);
        ApiResponse::ok(json!({"access": access, "refresh": refresh, "user": user}))
    }

    fn register(&self, data: &mut MockData, request: &ApiRequest) -> ApiResponse {
        let (Some(username), Some(email), Some(password)) = (
            body_str(request, "username"),
            body_str(request, "email"),
            body_str(request, "password"),
        ) else {
            return status(
                StatusCode::BAD_REQUEST,
                json!({"message": "username, email and password are required"}),
            );
        };
        if data.users.iter().any(|u| u.email == email || u.username == username) {
            return status(
                StatusCode::BAD_REQUEST,
                json!({"message": "A user with that username or email already exists"}),
            );
        }

        let mut tenant_ids = Vec::new();
        if let Some(tenant_id) = body_str(request, "tenant_id") {
            tenant_ids.push(tenant_id.to_string());
        } else if let Some(tenant_name) = body_str(request, "tenantName") {
            let tenant_id = uuid::Uuid::new_v4().to_string();
            data.tenants
                .push(json!({"id": tenant_id, "name": tenant_name, "isActive": true}));
            tenant_ids.push(tenant_id);
        }

        let user = MockUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            roles: vec!["member".to_string()],
            tenant_ids,
        };
        let body = user.to_json(None);
        data.users.push(user);
        status(StatusCode::CREATED, body)
    }

    fn refresh(&self, data: &mut MockData, request: &ApiRequest) -> ApiResponse {
        let user_id = body_str(request, "refresh")
            .and_then(|r| data.refresh_tokens.get(r))
            .cloned();
        match user_id {
            Some(user_id) => {
                let access = mint_access_token(&user_id);
                data.access_tokens.insert(access.clone(), user_id);
                ApiResponse::ok(json!({"access": access}))
            }
            None => status(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            ),
        }
    }

    fn switch_tenant(&self, data: &mut MockData, user_id: &str, tenant_id: &str) -> ApiResponse {
        if data.tenant(tenant_id).is_none() {
            return status(StatusCode::NOT_FOUND, json!({"detail": "Tenant not found"}));
        }
        let member = data
            .user(user_id)
            .map(|u| u.tenant_ids.iter().any(|t| t == tenant_id))
            .unwrap_or(false);
        if !member {
            return status(
                StatusCode::FORBIDDEN,
                json!({"detail": "You do not have access to this tenant"}),
            );
        }
        data.current_tenant
            .insert(user_id.to_string(), tenant_id.to_string());
        ApiResponse::ok(json!({"success": true, "tenant_id": tenant_id}))
    }

    fn tenants(
        &self,
        data: &mut MockData,
        request: &ApiRequest,
        user_id: &str,
        rest: &str,
    ) -> ApiResponse {
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let member_of: Vec<String> = data
            .user(user_id)
            .map(|u| u.tenant_ids.clone())
            .unwrap_or_default();

        match (&request.method, segments.as_slice()) {
            (&Method::GET, []) => {
                let tenants: Vec<Value> = data
                    .tenants
                    .iter()
                    .filter(|t| member_of.iter().any(|id| t["id"] == id.as_str()))
                    .cloned()
                    .collect();
                ApiResponse::ok(json!({"count": tenants.len(), "results": tenants}))
            }
            (&Method::POST, []) => {
                let Some(name) = body_str(request, "name") else {
                    return status(StatusCode::BAD_REQUEST, json!({"message": "name is required"}));
                };
                let id = uuid::Uuid::new_v4().to_string();
                let domain = body_str(request, "domain")
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!("{}.example.com", name.to_lowercase().replace(' ', "-"))
                    });
                let tenant = json!({"id": id, "name": name, "domain": domain, "isActive": true});
                data.tenants.push(tenant.clone());
                if let Some(user) = data.users.iter_mut().find(|u| u.id == user_id) {
                    user.tenant_ids.push(id);
                }
                status(StatusCode::CREATED, tenant)
            }
            (&Method::GET, ["current"]) => {
                let current = request
                    .header(&self.tenant_header)
                    .map(str::to_string)
                    .or_else(|| data.current_tenant.get(user_id).cloned())
                    .or_else(|| member_of.first().cloned());
                match current.and_then(|id| data.tenant(&id).cloned()) {
                    Some(tenant) => ApiResponse::ok(tenant),
                    None => status(StatusCode::NOT_FOUND, json!({"detail": "No current tenant"})),
                }
            }
            (method, [id, ..]) if !member_of.iter().any(|t| t == id) => {
                debug!("Mock: {} on tenant {} refused", method, id);
                status(StatusCode::NOT_FOUND, json!({"detail": "Tenant not found"}))
            }
            (&Method::GET, [id]) => match data.tenant(id) {
                Some(tenant) => ApiResponse::ok(tenant.clone()),
                None => status(StatusCode::NOT_FOUND, json!({"detail": "Tenant not found"})),
            },
            (&Method::PUT | &Method::PATCH, [id]) => {
                let updates = request
                    .body
                    .as_ref()
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Map::new);
                match data.tenants.iter_mut().find(|t| t["id"] == *id) {
                    Some(Value::Object(tenant)) => {
                        for (k, v) in updates {
                            if k != "id" {
                                tenant.insert(k, v);
                            }
                        }
                        ApiResponse::ok(Value::Object(tenant.clone()))
                    }
                    _ => status(StatusCode::NOT_FOUND, json!({"detail": "Tenant not found"})),
                }
            }
            (&Method::DELETE, [id]) => {
                let id = id.to_string();
                data.tenants.retain(|t| t["id"] != id.as_str());
                for user in data.users.iter_mut() {
                    user.tenant_ids.retain(|t| *t != id);
                }
                status(StatusCode::NO_CONTENT, Value::Null)
            }
            (&Method::GET, [id, "users"]) => {
                let users: Vec<Value> = data
                    .users
                    .iter()
                    .filter(|u| u.tenant_ids.iter().any(|t| t == id))
                    .map(|u| {
                        json!({
                            "id": u.id,
                            "username": u.username,
                            "email": u.email,
                            "role": u.roles.first(),
                        })
                    })
                    .collect();
                ApiResponse::ok(json!({"count": users.len(), "results": users}))
            }
            _ => self.generic(request),
        }
    }

    fn graphql(&self, data: &MockData, request: &ApiRequest) -> ApiResponse {
        let authorized = request
            .bearer_token()
            .map(|t| data.access_tokens.contains_key(t))
            .unwrap_or(false);
        if !authorized {
            return unauthorized();
        }
        ApiResponse::ok(json!({
            "data": null,
            "errors": [{"message": "Mock API does not implement GraphQL"}],
        }))
    }

    fn generic(&self, request: &ApiRequest) -> ApiResponse {
        let tenant_id = request.header(&self.tenant_header);
        match request.method {
            Method::GET => ApiResponse::ok(json!({
                "message": "Mock API endpoint not implemented",
                "path": request.route(),
                "tenant_id": tenant_id,
                "results": [],
            })),
            Method::DELETE => status(StatusCode::NO_CONTENT, Value::Null),
            _ => {
                let mut body = request
                    .body
                    .as_ref()
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Map::new);
                body.entry("id").or_insert_with(|| json!("mock-id"));
                body.insert("tenant_id".to_string(), json!(tenant_id));
                body.insert("message".to_string(), json!("Saved with mock API"));
                let code = if request.method == Method::POST {
                    StatusCode::CREATED
                } else {
                    StatusCode::OK
                };
                status(code, Value::Object(body))
            }
        }
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    fn get_name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut data = self.data.lock().await;
        data.requests.push(RecordedRequest {
            method: request.method.clone(),
            path: request.route().to_string(),
            authorization: request.header("authorization").map(str::to_string),
            tenant_header: request.header(&self.tenant_header).map(str::to_string),
        });
        let response = self.route(&mut data, request);
        debug!(
            "Mock {} {} -> {}",
            request.method,
            request.route(),
            response.status
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, HeaderValue, AUTHORIZATION};

    fn backend() -> MockBackend {
        MockBackend::new(EndpointsConfig::default(), MockBackendConfig::default())
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn login(backend: &MockBackend) -> Value {
        backend
            .send(&ApiRequest::post("/auth/login/").with_body(json!({
                "email": "admin@example.com",
                "password": "admin"
            })))
            .await
            .unwrap()
            .body
    }

    #[test]
    fn test_match_template() {
        assert_eq!(
            match_template("/tenants/{id}/switch/", "/tenants/42/switch/").as_deref(),
            Some("42")
        );
        assert_eq!(match_template("/tenants/{id}/switch/", "/tenants/42/"), None);
        assert_eq!(match_template("/tenants/{id}/switch/", "/tenants//switch/"), None);
    }

    #[tokio::test]
    async fn test_login_and_profile() {
        let backend = backend();
        let tokens = login(&backend).await;
        let access = tokens["access"].as_str().unwrap();
        assert!(tokens["refresh"].is_string());
        assert_eq!(tokens["user"]["tenant_id"], "1");

        let me = backend
            .send(&ApiRequest::get("/users/me/").with_header(AUTHORIZATION, bearer(access)))
            .await
            .unwrap();
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["username"], "admin");
    }

    #[tokio::test]
    async fn test_bad_password() {
        let backend = backend();
        let response = backend
            .send(&ApiRequest::post("/auth/login/").with_body(json!({
                "email": "admin@example.com",
                "password": "nope"
            })))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_access_token_then_refresh() {
        let backend = backend();
        let tokens = login(&backend).await;
        let access = tokens["access"].as_str().unwrap().to_string();
        backend.expire_access_tokens().await;

        let response = backend
            .send(&ApiRequest::get("/products/").with_header(AUTHORIZATION, bearer(&access)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let refreshed = backend
            .send(
                &ApiRequest::post("/auth/token/refresh/")
                    .with_body(json!({"refresh": tokens["refresh"]})),
            )
            .await
            .unwrap();
        assert_eq!(refreshed.status, StatusCode::OK);
        let new_access = refreshed.body["access"].as_str().unwrap();

        let response = backend
            .send(&ApiRequest::get("/products/").with_header(AUTHORIZATION, bearer(new_access)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(backend.count(Method::GET, "/products/").await, 2);
    }

    #[tokio::test]
    async fn test_switch_to_foreign_tenant_is_forbidden() {
        let backend = backend();
        backend.add_tenant("2", "Mango Traders", "nobody").await;
        let tokens = login(&backend).await;
        let access = tokens["access"].as_str().unwrap();

        let response = backend
            .send(&ApiRequest::post("/tenants/2/switch/").with_header(AUTHORIZATION, bearer(access)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);

        let response = backend
            .send(&ApiRequest::post("/tenants/77/switch/").with_header(AUTHORIZATION, bearer(access)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tenant_crud() {
        let backend = backend();
        let tokens = login(&backend).await;
        let auth = bearer(tokens["access"].as_str().unwrap());

        let created = backend
            .send(
                &ApiRequest::post("/tenants/")
                    .with_header(AUTHORIZATION, auth.clone())
                    .with_body(json!({"name": "Fresh Fruits"})),
            )
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["domain"], "fresh-fruits.example.com");
        let id = created.body["id"].as_str().unwrap().to_string();

        let listed = backend
            .send(&ApiRequest::get("/tenants/").with_header(AUTHORIZATION, auth.clone()))
            .await
            .unwrap();
        assert_eq!(listed.body["count"], 2);

        let updated = backend
            .send(
                &ApiRequest::patch(format!("/tenants/{}/", id))
                    .with_header(AUTHORIZATION, auth.clone())
                    .with_body(json!({"name": "Fresh Fruits Ltd"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.body["name"], "Fresh Fruits Ltd");

        let deleted = backend
            .send(&ApiRequest::delete(format!("/tenants/{}/", id)).with_header(AUTHORIZATION, auth))
            .await
            .unwrap();
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_generic_endpoints_require_auth() {
        let backend = backend();
        let response = backend.send(&ApiRequest::get("/sales/")).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let health = backend.send(&ApiRequest::get("/health-check/")).await.unwrap();
        assert_eq!(health.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_current_tenant_reads_configured_header() {
        let backend = backend().with_tenant_header("X-Org-ID");
        backend.add_tenant("2", "Mango Traders", "admin").await;
        let tokens = login(&backend).await;

        let current = backend
            .send(
                &ApiRequest::get("/tenants/current/")
                    .with_header(AUTHORIZATION, bearer(tokens["access"].as_str().unwrap()))
                    .with_header(HeaderName::from_static("x-org-id"), HeaderValue::from_static("2"))
                    .with_header(HeaderName::from_static("x-tenant-id"), HeaderValue::from_static("1")),
            )
            .await
            .unwrap();

        assert_eq!(current.status, StatusCode::OK);
        assert_eq!(current.body["name"], "Mango Traders");
        let recorded = backend.requests().await;
        assert_eq!(recorded.last().unwrap().tenant_header.as_deref(), Some("2"));
    }
}
