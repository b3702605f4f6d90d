pub mod base;
pub mod fallback_backend;
pub mod mock_backend;
pub mod real_backend;

// Re-export from base.rs so we can do "use crate::backend::*;"
pub use base::{create_backend, Backend};
pub use fallback_backend::FallbackBackend;
pub use mock_backend::MockBackend;
pub use real_backend::RealBackend;
