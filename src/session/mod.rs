//! The process-wide session: tokens, current user and current tenant.
//!
//! A single [`SessionContext`] is created at startup and handed to every
//! component that needs credentials or tenant context.

mod context;
mod events;

pub use context::{SessionContext, SessionState};
pub use events::{LogoutReason, SessionEvent};
