//! Gateway command - start the edge gateway.

use anyhow::Result;
use medgate_core::Config;

use super::{mode_name, parse_bind};
use crate::ui;

/// Gateway run arguments.
#[derive(Debug, Clone, Default)]
pub struct GatewayArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
    /// Auth service URL override.
    pub auth_url: Option<String>,
}

/// Start the gateway.
pub async fn run_gateway(mut config: Config, args: GatewayArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind.as_deref() {
        config.gateway.mode = parse_bind(bind);
    }
    if let Some(url) = args.auth_url {
        config.gateway.auth_service_url = url;
    }
    config.validate()?;

    let gateway = config.gateway;
    ui::header("Starting medgate Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway.mode.address(), gateway.port),
    );
    ui::kv("Mode", mode_name(&gateway.mode));
    ui::kv("Auth service", &gateway.auth_service_url);
    ui::kv("Routes", &gateway.routes.len().to_string());
    for route in &gateway.routes {
        let guard = if route.jwt_validation { "bearer" } else { "open" };
        ui::kv(
            &format!("  {}", route.path_prefix),
            &format!("{} ({guard})", route.upstream),
        );
    }
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    medgate_gateway::start(gateway).await?;

    Ok(())
}
