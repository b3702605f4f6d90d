/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Explicit logout.
    UserRequested,
    /// The refresh token was rejected (or the refresh call failed).
    RefreshFailed,
    /// A 401 arrived and there was no refresh token to try.
    MissingRefreshToken,
}

/// Notifications published on every session change.
///
/// `LoggedOut` is the hook UIs use to send the user back to a login screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn {
        username: Option<String>,
    },
    TokensRefreshed,
    UserUpdated,
    TenantChanged {
        previous: Option<String>,
        current: Option<String>,
    },
    LoggedOut {
        reason: LogoutReason,
    },
}
