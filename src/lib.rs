//! Library exports for mangogate, shared between the binary and tests.

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod models;
pub mod session;
pub mod startup;
pub mod store;
pub mod tenants;
pub mod utils;

pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use startup::{build_client, Client};
