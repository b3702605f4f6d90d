//! CLI argument definitions for the mangogate binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Authenticated, tenant-aware client for the Star Mango ERP API
#[derive(Parser, Debug)]
#[command(name = "mangogate")]
#[command(version)]
pub struct Cli {
    /// YAML configuration file. A missing file means all defaults.
    #[arg(short, long, default_value = "./config.yaml", env = "MANGOGATE_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the JSON schema of the configuration file
    Schema,
    /// Check that the backend API is reachable
    Health,
    /// Sign in and persist the session
    Login(LoginArgs),
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List the tenants available to the signed-in user
    Tenants,
    /// Make another tenant current
    Switch {
        /// Tenant id
        tenant_id: String,
    },
    /// GET an API path through the gateway and print the JSON response
    Get {
        /// Path relative to the API base URL, e.g. /products/
        path: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Username (or use --email)
    #[arg(short, long, conflicts_with = "email")]
    pub username: Option<String>,

    #[arg(short, long)]
    pub email: Option<String>,

    #[arg(short, long, env = "MANGOGATE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Tenant to act as after signing in
    #[arg(short, long)]
    pub tenant: Option<String>,
}
