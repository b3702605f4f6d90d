use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use super::events::{LogoutReason, SessionEvent};
use crate::error::GatewayResult;
use crate::models::{CurrentUser, Session, TokenPair};
use crate::store::{keys, Store};

const EVENT_CAPACITY: usize = 64;

/// In-memory view of the session, mirrored to the token store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub user: Option<CurrentUser>,
    pub tenant_id: Option<String>,
}

/// Owns the session and writes every change through to the token store.
///
/// Cheap to clone; all clones share the same state and event channel.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    /// An empty session backed by `store`. Nothing is read from the store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                state: RwLock::new(SessionState::default()),
                events,
            }),
        }
    }

    /// Loads whatever a previous run left in the store.
    pub async fn restore(store: Arc<dyn Store>) -> GatewayResult<Self> {
        let access = store.get(keys::ACCESS_TOKEN).await?;
        let refresh = store.get(keys::REFRESH_TOKEN).await?;
        let tenant_id = store.get(keys::CURRENT_TENANT).await?;
        let user = match store.get(keys::CURRENT_USER).await? {
            Some(raw) => match serde_json::from_str::<CurrentUser>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Discarding unreadable cached user: {}", e);
                    store.remove(keys::CURRENT_USER).await?;
                    None
                }
            },
            None => None,
        };

        let context = Self::new(store);
        {
            let mut state = context.inner.state.write().await;
            state.session = access.map(|a| Session::new(a, refresh));
            state.user = user;
            state.tenant_id = tenant_id;
            info!(
                authenticated = state.session.is_some(),
                tenant_id = state.tenant_id.as_deref().unwrap_or("none"),
                "Restored session from {} store",
                context.inner.store.get_name()
            );
        }
        Ok(context)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        debug!("Session event: {:?}", event);
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.state.read().await.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.state.read().await.session.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    pub async fn tenant_id(&self) -> Option<String> {
        self.inner.state.read().await.tenant_id.clone()
    }

    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.inner.state.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.session.is_some()
    }

    /// Starts a new session, replacing any previous one.
    pub async fn start_session(&self, session: Session, user: Option<CurrentUser>) -> GatewayResult<()> {
        let username = user.as_ref().map(|u| u.username.clone());
        {
            let mut state = self.inner.state.write().await;
            self.persist_tokens(&session).await?;
            self.persist_user(user.as_ref()).await?;
            state.session = Some(session);
            state.user = user;
        }
        self.publish(SessionEvent::SignedIn { username });
        Ok(())
    }

    /// Applies a refresh result to the current session and returns the new session.
    pub async fn rotate_tokens(&self, tokens: TokenPair) -> GatewayResult<Session> {
        let rotated = {
            let mut state = self.inner.state.write().await;
            let rotated = match &state.session {
                Some(current) => current.rotated(tokens.access, tokens.refresh),
                None => Session::new(tokens.access, tokens.refresh),
            };
            self.persist_tokens(&rotated).await?;
            state.session = Some(rotated.clone());
            rotated
        };
        self.publish(SessionEvent::TokensRefreshed);
        Ok(rotated)
    }

    pub async fn set_user(&self, user: CurrentUser) -> GatewayResult<()> {
        {
            let mut state = self.inner.state.write().await;
            self.persist_user(Some(&user)).await?;
            state.user = Some(user);
        }
        self.publish(SessionEvent::UserUpdated);
        Ok(())
    }

    /// Selects the current tenant and returns the previously selected one.
    pub async fn set_tenant(&self, tenant_id: Option<String>) -> GatewayResult<Option<String>> {
        let previous = {
            let mut state = self.inner.state.write().await;
            match &tenant_id {
                Some(id) => self.inner.store.set(keys::CURRENT_TENANT, id).await?,
                None => self.inner.store.remove(keys::CURRENT_TENANT).await?,
            }
            std::mem::replace(&mut state.tenant_id, tenant_id.clone())
        };
        if previous != tenant_id {
            self.publish(SessionEvent::TenantChanged {
                previous: previous.clone(),
                current: tenant_id,
            });
        }
        Ok(previous)
    }

    /// Drops tokens and the cached user. The tenant selection is kept.
    ///
    /// Never fails: memory is always cleared, store errors are logged.
    pub async fn clear_session(&self, reason: LogoutReason) {
        {
            let mut state = self.inner.state.write().await;
            state.session = None;
            state.user = None;
            for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::CURRENT_USER] {
                self.remove_logged(key).await;
            }
        }
        warn!(reason = ?reason, "Session cleared");
        self.publish(SessionEvent::LoggedOut { reason });
    }

    /// Drops everything, tenant included.
    pub async fn clear_all(&self, reason: LogoutReason) {
        {
            let mut state = self.inner.state.write().await;
            *state = SessionState::default();
            for key in keys::ALL {
                self.remove_logged(key).await;
            }
        }
        info!(reason = ?reason, "Session and tenant selection cleared");
        self.publish(SessionEvent::LoggedOut { reason });
    }

    async fn remove_logged(&self, key: &str) {
        if let Err(e) = self.inner.store.remove(key).await {
            error!("Failed to remove '{}' from token store: {}", key, e);
        }
    }

    async fn persist_tokens(&self, session: &Session) -> GatewayResult<()> {
        let store = &self.inner.store;
        store.set(keys::ACCESS_TOKEN, &session.access_token).await?;
        match &session.refresh_token {
            Some(refresh) => store.set(keys::REFRESH_TOKEN, refresh).await,
            None => store.remove(keys::REFRESH_TOKEN).await,
        }
    }

    async fn persist_user(&self, user: Option<&CurrentUser>) -> GatewayResult<()> {
        match user {
            Some(user) => {
                let raw = serde_json::to_string(user)?;
                self.inner.store.set(keys::CURRENT_USER, &raw).await
            }
            None => self.inner.store.remove(keys::CURRENT_USER).await,
        }
    }
}
