use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::request::ApiRequest;
use crate::backend::Backend;
use crate::cache::QueryCache;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Session, TokenPair};
use crate::session::{LogoutReason, SessionContext};

type RefreshFuture = Shared<BoxFuture<'static, GatewayResult<Session>>>;

struct InFlight {
    generation: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct Slot {
    in_flight: Option<InFlight>,
    generation: u64,
}

/// Exchanges the refresh token for a new access token, at most once at a time.
///
/// Every caller that asks while a refresh is running awaits that same refresh
/// and gets its outcome. A caller whose token was already replaced by a
/// finished refresh gets the current session without a new call.
pub struct TokenRefresher {
    backend: Arc<dyn Backend>,
    session: SessionContext,
    cache: QueryCache,
    refresh_path: String,
    slot: Mutex<Slot>,
}

impl TokenRefresher {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: SessionContext,
        cache: QueryCache,
        refresh_path: String,
    ) -> Self {
        Self {
            backend,
            session,
            cache,
            refresh_path,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Refreshes the session that `stale_token` belonged to.
    ///
    /// On failure the session and the query cache have already been cleared
    /// and `LoggedOut` published.
    pub async fn refresh(&self, stale_token: Option<&str>) -> GatewayResult<Session> {
        let (generation, future) = {
            let mut slot = self.slot.lock().await;
            // Every waiter of a finished refresh may have been dropped before
            // clearing the slot; its outcome must not be handed out again.
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|f| f.future.peek().is_some())
            {
                slot.in_flight = None;
            }
            match &slot.in_flight {
                Some(in_flight) => {
                    debug!(
                        event_name = "gateway.refresh.joined",
                        generation = in_flight.generation,
                        "Waiting on in-flight token refresh"
                    );
                    (in_flight.generation, in_flight.future.clone())
                }
                None => {
                    let current = self.session.session().await;
                    if let Some(current) = current {
                        if Some(current.access_token.as_str()) != stale_token {
                            debug!(
                                event_name = "gateway.refresh.skipped",
                                "Token already refreshed by another request"
                            );
                            return Ok(current);
                        }
                    }

                    let Some(refresh_token) = self.session.refresh_token().await else {
                        warn!(
                            event_name = "gateway.refresh.no_refresh_token",
                            "Unauthorized and no refresh token available"
                        );
                        self.session
                            .clear_session(LogoutReason::MissingRefreshToken)
                            .await;
                        self.cache.clear();
                        return Err(GatewayError::NoRefreshToken);
                    };

                    slot.generation += 1;
                    let generation = slot.generation;
                    let future = exchange(
                        self.backend.clone(),
                        self.session.clone(),
                        self.cache.clone(),
                        self.refresh_path.clone(),
                        refresh_token,
                    )
                    .boxed()
                    .shared();
                    slot.in_flight = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    (generation, future)
                }
            }
        };

        let outcome = future.await;

        let mut slot = self.slot.lock().await;
        if slot
            .in_flight
            .as_ref()
            .map(|f| f.generation == generation)
            .unwrap_or(false)
        {
            slot.in_flight = None;
        }
        outcome
    }
}

async fn exchange(
    backend: Arc<dyn Backend>,
    session: SessionContext,
    cache: QueryCache,
    refresh_path: String,
    refresh_token: String,
) -> GatewayResult<Session> {
    info!(event_name = "gateway.refresh.started", "Refreshing access token");

    let request = ApiRequest::post(refresh_path)
        .with_body(json!({ "refresh": refresh_token }))
        .without_refresh();
    let result = async {
        let tokens: TokenPair = backend.send(&request).await?.into_result()?.json()?;
        session.rotate_tokens(tokens).await
    }
    .await;

    match result {
        Ok(rotated) => {
            info!(
                event_name = "gateway.refresh.succeeded",
                expires_at = ?rotated.expires_at,
                "Access token refreshed"
            );
            Ok(rotated)
        }
        Err(e) => {
            warn!(
                event_name = "gateway.refresh.failed",
                "Token refresh failed, signing out: {}", e
            );
            session.clear_session(LogoutReason::RefreshFailed).await;
            cache.clear();
            Err(e)
        }
    }
}
