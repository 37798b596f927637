//! Auth command - start the authentication service.

use anyhow::{Result, bail};
use medgate_core::Config;

use super::{mode_name, parse_bind};
use crate::ui;

/// Auth service run arguments.
#[derive(Debug, Clone, Default)]
pub struct AuthArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
}

/// Start the authentication service.
pub async fn run_auth(mut config: Config, args: AuthArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.auth.port = port;
    }
    if let Some(bind) = args.bind.as_deref() {
        config.auth.mode = parse_bind(bind);
    }
    config.validate()?;

    if config.auth.jwt_secret.is_none() {
        ui::error("No signing key configured");
        ui::info("Generate one with 'medgate keygen' and set MEDGATE_JWT_SECRET");
        bail!("auth.jwtSecret is required");
    }

    let auth = config.auth;
    ui::header("Starting medgate Authentication Service");
    ui::kv("Address", &format!("{}:{}", auth.mode.address(), auth.port));
    ui::kv("Mode", mode_name(&auth.mode));
    ui::kv("Token TTL", &format!("{}h", auth.token_ttl_hours));
    ui::kv("Data", &auth.data_dir().display().to_string());
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    medgate_auth::start(auth).await?;

    Ok(())
}
