//! The authenticated request pipeline: decoration, the 401 refresh-and-retry
//! protocol, and cached reads.

pub mod client;
pub mod decorate;
pub mod refresh;
pub mod request;

pub use client::Gateway;
pub use refresh::TokenRefresher;
pub use request::{ApiRequest, ApiResponse, RequestKind};
