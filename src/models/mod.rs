pub mod auth;
pub mod session;
pub mod tenant;
pub mod user;

pub use auth::*;
pub use session::Session;
pub use tenant::Tenant;
pub use user::CurrentUser;
