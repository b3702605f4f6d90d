use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::token_expiry;

/// The active credential pair. At most one exists per session context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Read from the access token's `exp` claim; `None` for opaque tokens.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: String, refresh_token: Option<String>) -> Self {
        let expires_at = token_expiry(&access_token);
        Session {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Replaces the access token, keeping the old refresh token unless a new one was issued.
    pub fn rotated(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Session::new(
            access_token,
            refresh_token.or_else(|| self.refresh_token.clone()),
        )
    }

    /// True when the access token expires within `leeway` of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - leeway <= now,
            None => false,
        }
    }
}
