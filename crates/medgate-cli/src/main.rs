//! medgate CLI - run the authentication service and the edge gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use medgate_core::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "medgate")]
#[command(about = "medgate - token authentication service and edge gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.medgate/medgate.json)
    #[arg(short, long, global = true, env = "MEDGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authentication service operations
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },

    /// Gateway operations
    Gateway {
        #[command(subcommand)]
        action: GatewayCommands,
    },

    /// Credential record management
    Users {
        #[command(subcommand)]
        action: UsersCommands,

        /// Credential database directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Print a fresh base64 signing key
    Keygen,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Start the authentication service
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum GatewayCommands {
    /// Start the gateway
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,

        /// Authentication service base URL
        #[arg(long)]
        auth_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum UsersCommands {
    /// Add a credential record
    Add {
        /// Login email
        #[arg(long)]
        email: String,

        /// Login password
        #[arg(long)]
        password: String,

        /// Role: ADMIN or USER
        #[arg(long, default_value = "USER")]
        role: String,
    },

    /// List credential records
    List,

    /// Remove a credential record
    Remove {
        /// Login email
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    init_logging(cli.verbose || config.settings.debug, config.settings.log_format);

    let config = config.with_env_overrides();
    tracing::debug!(path = ?cli.config, log_format = ?config.settings.log_format, "Configuration loaded");

    match cli.command {
        Commands::Auth { action } => match action {
            AuthCommands::Run { port, bind } => {
                commands::run_auth(config, commands::auth::AuthArgs { port, bind }).await?;
            }
        },

        Commands::Gateway { action } => match action {
            GatewayCommands::Run {
                port,
                bind,
                auth_url,
            } => {
                let args = commands::gateway::GatewayArgs {
                    port,
                    bind,
                    auth_url,
                };
                commands::run_gateway(config, args).await?;
            }
        },

        Commands::Users { action, data_dir } => {
            let action = match action {
                UsersCommands::Add {
                    email,
                    password,
                    role,
                } => commands::users::UsersAction::Add {
                    email,
                    password,
                    role,
                },
                UsersCommands::List => commands::users::UsersAction::List,
                UsersCommands::Remove { email } => commands::users::UsersAction::Remove { email },
            };
            let data_dir = data_dir.unwrap_or_else(|| config.auth.data_dir());
            commands::run_users(commands::users::UsersArgs { action, data_dir }).await?;
        }

        Commands::Keygen => commands::run_keygen(),
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_target(false));
    let pretty = (format == LogFormat::Pretty).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(json)
        .with(pretty)
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_users_add() {
        let cli = Cli::try_parse_from([
            "medgate",
            "users",
            "add",
            "--email",
            "u@test.com",
            "--password",
            "pw123",
        ])
        .unwrap();

        match cli.command {
            Commands::Users {
                action: UsersCommands::Add { email, role, .. },
                data_dir,
            } => {
                assert_eq!(email, "u@test.com");
                assert_eq!(role, "USER");
                assert!(data_dir.is_none());
            }
            _ => panic!("expected users add"),
        }
    }

    #[test]
    fn test_parse_gateway_run() {
        let cli = Cli::try_parse_from([
            "medgate",
            "-v",
            "gateway",
            "run",
            "--port",
            "8080",
            "--auth-url",
            "http://auth:4005",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Gateway {
                action: GatewayCommands::Run { port, auth_url, .. },
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(auth_url.as_deref(), Some("http://auth:4005"));
            }
            _ => panic!("expected gateway run"),
        }
    }
}
