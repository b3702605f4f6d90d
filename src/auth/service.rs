use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::GatewayResult;
use crate::gateway::{ApiRequest, Gateway};
use crate::models::{
    CurrentUser, LoginCredentials, LoginResponse, PasswordChange, PasswordResetConfirmation,
    PasswordResetRequest, RegisterCredentials, Session,
};
use crate::session::LogoutReason;

/// Sign-in, sign-out and account operations on top of the gateway.
pub struct AuthService {
    gateway: Arc<Gateway>,
    refresh_leeway: Duration,
}

impl AuthService {
    pub fn new(gateway: Arc<Gateway>, config: &AuthConfig) -> Self {
        Self {
            gateway,
            refresh_leeway: Duration::seconds(config.refresh_leeway_secs),
        }
    }

    /// Exchanges credentials for a session and selects a tenant.
    ///
    /// The tenant comes from the credentials, or else from the returned user.
    pub async fn login(&self, credentials: &LoginCredentials) -> GatewayResult<Option<CurrentUser>> {
        let endpoints = self.gateway.endpoints();
        let body = serde_json::to_value(credentials)?;
        let response: LoginResponse = self
            .gateway
            .send(
                ApiRequest::post(endpoints.login.as_str())
                    .with_body(body)
                    .without_refresh(),
            )
            .await?
            .json()?;

        let session = self.gateway.session();
        session
            .start_session(
                Session::new(response.access, Some(response.refresh)),
                response.user.clone(),
            )
            .await?;

        let user = match response.user {
            Some(user) => Some(user),
            None => match self.fetch_current_user().await {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Signed in but could not load the user profile: {}", e);
                    None
                }
            },
        };

        let tenant_id = credentials
            .tenant_id
            .clone()
            .or_else(|| user.as_ref().and_then(|u| u.tenant_id.clone()));
        if tenant_id.is_some() {
            session.set_tenant(tenant_id.clone()).await?;
        }

        let cache = self.gateway.cache();
        cache.invalidate_resource("tenants");
        cache.invalidate_resource("currentUser");

        info!(
            event_name = "auth.login.succeeded",
            username = user.as_ref().map(|u| u.username.as_str()).unwrap_or_default(),
            tenant_id = tenant_id.as_deref().unwrap_or("none"),
            "Signed in"
        );
        Ok(user)
    }

    /// Creates an account. The current session is left untouched.
    pub async fn register(&self, credentials: &RegisterCredentials) -> GatewayResult<CurrentUser> {
        let body = serde_json::to_value(credentials)?;
        self.gateway
            .send(
                ApiRequest::post(self.gateway.endpoints().register.as_str())
                    .with_body(body)
                    .without_refresh(),
            )
            .await?
            .json()
    }

    pub async fn refresh(&self) -> GatewayResult<Session> {
        self.gateway.refresh_session().await
    }

    /// Ends the session locally whatever the backend says about it.
    pub async fn logout(&self) {
        let session = self.gateway.session();
        if session.is_authenticated().await {
            let refresh = session.refresh_token().await;
            let request = ApiRequest::post(self.gateway.endpoints().logout.as_str())
                .with_body(json!({ "refresh": refresh }))
                .without_refresh();
            if let Err(e) = self.gateway.send(request).await {
                warn!(
                    event_name = "auth.logout.backend_failed",
                    "Backend logout failed, clearing local session anyway: {}", e
                );
            }
        }

        session.clear_all(LogoutReason::UserRequested).await;
        self.gateway.cache().clear();
        info!(event_name = "auth.logout.completed", "Signed out");
    }

    /// The cached user, loading it from the backend when missing.
    pub async fn current_user(&self) -> GatewayResult<CurrentUser> {
        match self.gateway.session().current_user().await {
            Some(user) => Ok(user),
            None => self.fetch_current_user().await,
        }
    }

    /// Reloads the user from the backend and caches it.
    pub async fn fetch_current_user(&self) -> GatewayResult<CurrentUser> {
        let user: CurrentUser = self.gateway.get(&self.gateway.endpoints().me).await?;
        self.gateway.session().set_user(user.clone()).await?;
        Ok(user)
    }

    /// The stored access token, refreshed first if it is about to expire.
    pub async fn valid_access_token(&self) -> Option<String> {
        let session = self.gateway.session().session().await?;
        if !session.is_expired_at(Utc::now(), self.refresh_leeway) {
            return Some(session.access_token);
        }
        match self.gateway.refresh_session().await {
            Ok(refreshed) => Some(refreshed.access_token),
            Err(e) => {
                warn!("Proactive token refresh failed: {}", e);
                None
            }
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.gateway.session().is_authenticated().await
    }

    pub async fn request_password_reset(&self, request: &PasswordResetRequest) -> GatewayResult<()> {
        let body = serde_json::to_value(request)?;
        self.gateway
            .send(
                ApiRequest::post(self.gateway.endpoints().password_reset.as_str())
                    .with_body(body)
                    .without_refresh(),
            )
            .await?;
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        confirmation: &PasswordResetConfirmation,
    ) -> GatewayResult<()> {
        let body = serde_json::to_value(confirmation)?;
        self.gateway
            .send(
                ApiRequest::post(self.gateway.endpoints().password_reset_confirm.as_str())
                    .with_body(body)
                    .without_refresh(),
            )
            .await?;
        Ok(())
    }

    pub async fn change_password(&self, change: &PasswordChange) -> GatewayResult<()> {
        let body = serde_json::to_value(change)?;
        self.gateway
            .send(ApiRequest::post(self.gateway.endpoints().password_change.as_str()).with_body(body))
            .await?;
        Ok(())
    }
}
