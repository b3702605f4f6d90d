mod cli;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use cli::{Cli, Commands, LoginArgs};
use mangogate::config::{load_config, schema_json, ConfigV1};
use mangogate::health::{check_api_health_at, HEALTH_CHECK_TIMEOUT};
use mangogate::models::LoginCredentials;
use mangogate::utils::logger::init_logging;
use mangogate::{build_client, GatewayError, GatewayResult};

fn print_json<T: Serialize>(value: &T) -> GatewayResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands, config: ConfigV1) -> GatewayResult<()> {
    match command {
        Commands::Schema => {
            let schema = schema_json()?;
            println!("{}", schema);
            Ok(())
        }
        Commands::Health => {
            let health = check_api_health_at(
                &config.api.base_url,
                &config.endpoints.health,
                HEALTH_CHECK_TIMEOUT,
            )
            .await;
            print_json(&health)?;
            if health.is_available {
                Ok(())
            } else {
                Err(GatewayError::Network(health.message))
            }
        }
        Commands::Login(LoginArgs {
            username,
            email,
            password,
            tenant,
        }) => {
            let client = build_client(&config).await?;
            let user = client
                .auth
                .login(&LoginCredentials {
                    username,
                    email,
                    password,
                    tenant_id: tenant,
                })
                .await?;
            print_json(&user)
        }
        Commands::Logout => {
            let client = build_client(&config).await?;
            client.auth.logout().await;
            Ok(())
        }
        Commands::Whoami => {
            let client = build_client(&config).await?;
            let user = client.auth.current_user().await?;
            print_json(&user)
        }
        Commands::Tenants => {
            let client = build_client(&config).await?;
            let current = client.gateway.session().tenant_id().await;
            let tenants = client.tenants.list().await?;
            for tenant in tenants {
                let marker = if Some(&tenant.id) == current.as_ref() {
                    "*"
                } else {
                    " "
                };
                println!("{} {}\t{}", marker, tenant.id, tenant.name);
            }
            Ok(())
        }
        Commands::Switch { tenant_id } => {
            let client = build_client(&config).await?;
            client.tenants.switch(&tenant_id).await?;
            println!("Switched to tenant {}", tenant_id);
            Ok(())
        }
        Commands::Get { path } => {
            let client = build_client(&config).await?;
            let body: Value = client.gateway.get(&path).await?;
            print_json(&body)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
