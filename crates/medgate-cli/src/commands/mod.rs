//! CLI command implementations.

pub mod auth;
pub mod gateway;
pub mod keygen;
pub mod users;

pub use auth::run_auth;
pub use gateway::run_gateway;
pub use keygen::run_keygen;
pub use users::run_users;

use std::path::Path;

use anyhow::Context;
use medgate_core::{BindMode, Config};

/// Load the config file, or defaults when no file exists at the default
/// location. An explicitly named file must exist.
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load_default().with_context(|| {
            format!(
                "Failed to load config from {}",
                Config::default_path().display()
            )
        }),
    }
}

/// Parse a `--bind` value.
pub fn parse_bind(value: &str) -> BindMode {
    match value {
        "local" | "loopback" => BindMode::Local,
        "public" | "lan" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

/// Human-readable name of a bind mode.
pub const fn mode_name(mode: &BindMode) -> &'static str {
    match mode {
        BindMode::Local => "local",
        BindMode::Public => "public",
        BindMode::Custom(_) => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        assert_eq!(parse_bind("local"), BindMode::Local);
        assert_eq!(parse_bind("lan"), BindMode::Public);
        assert_eq!(
            parse_bind("10.0.0.5"),
            BindMode::Custom("10.0.0.5".to_string())
        );
        assert_eq!(mode_name(&BindMode::Public), "public");
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medgate.json");
        std::fs::write(&path, "{ gateway: { port: 9000 } }").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.gateway.port, 9000);

        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }
}
