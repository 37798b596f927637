//! Configuration loading and validation.
//!
//! A single JSON5 file configures both the authentication service and the
//! gateway. Config location: `~/.medgate/medgate.json`
//!
//! Everything here is read once at process start and never mutated while
//! the process runs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::secrets::SigningSecret;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_HOURS: u64 = 366 * 24;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Authentication service configuration.
    #[serde(default)]
    pub auth: AuthServiceConfig,

    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("medgate.json")
    }

    /// Get the medgate state directory.
    ///
    /// Uses `MEDGATE_STATE_DIR` env var if set, otherwise `~/.medgate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MEDGATE_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".medgate")
        } else {
            PathBuf::from(".medgate")
        }
    }

    /// Apply overrides from process environment variables.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    ///
    /// Recognised keys: `MEDGATE_JWT_SECRET` (falls back to `JWT_SECRET`),
    /// `MEDGATE_AUTH_SERVICE_URL`, `MEDGATE_AUTH_PORT`, `MEDGATE_GATEWAY_PORT`.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("MEDGATE_JWT_SECRET").or_else(|| lookup("JWT_SECRET")) {
            self.auth.jwt_secret = Some(secret);
        }

        if let Some(url) = lookup("MEDGATE_AUTH_SERVICE_URL") {
            self.gateway.auth_service_url = url;
        }

        if let Some(port) = lookup("MEDGATE_AUTH_PORT") {
            match port.parse() {
                Ok(p) => self.auth.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid MEDGATE_AUTH_PORT"),
            }
        }

        if let Some(port) = lookup("MEDGATE_GATEWAY_PORT") {
            match port.parse() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid MEDGATE_GATEWAY_PORT"),
            }
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.port == 0 {
            return Err(ConfigError::Validation(
                "Auth service port cannot be 0".to_string(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        if self.auth.token_ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Token TTL must be at least one hour".to_string(),
            ));
        }

        if self.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "Token TTL cannot exceed {MAX_TOKEN_TTL_HOURS} hours"
            )));
        }

        if let Some(secret) = &self.auth.jwt_secret {
            SigningSecret::from_base64(secret)
                .map_err(|e| ConfigError::Validation(format!("auth.jwtSecret: {e}")))?;
        }

        if self.gateway.validate_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Gateway validation timeout cannot be 0".to_string(),
            ));
        }

        if !is_http_url(&self.gateway.auth_service_url) {
            return Err(ConfigError::Validation(format!(
                "Auth service URL must be http(s): {}",
                self.gateway.auth_service_url
            )));
        }

        let mut ids = HashSet::new();
        for route in &self.gateway.routes {
            if !ids.insert(route.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate route id '{}'",
                    route.id
                )));
            }
            if !route.path_prefix.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' path prefix must start with '/'",
                    route.id
                )));
            }
            if !is_http_url(&route.upstream) {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' upstream must be http(s): {}",
                    route.id, route.upstream
                )));
            }
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Bind address mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

impl BindMode {
    /// Resolve the mode to a concrete bind address.
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            Self::Local => "127.0.0.1".to_string(),
            Self::Public => "0.0.0.0".to_string(),
            Self::Custom(addr) => addr.clone(),
        }
    }
}

/// Authentication service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthServiceConfig {
    /// Port to listen on.
    #[serde(default = "default_auth_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Base64-encoded HMAC signing key. Required to run the service.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// Directory for the credential database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            port: default_auth_port(),
            mode: BindMode::default(),
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            data_dir: None,
        }
    }
}

impl AuthServiceConfig {
    /// Token lifetime as a `Duration`, capped at `MAX_TOKEN_TTL_HOURS`.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        let hours = if self.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            MAX_TOKEN_TTL_HOURS
        } else {
            self.token_ttl_hours
        };
        Duration::from_secs(hours * 3600)
    }

    /// Resolved credential database directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Config::state_dir().join("auth"))
    }

    /// Decode the configured signing secret.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if no secret is configured, or
    /// `ConfigError::Validation` if it cannot be decoded.
    pub fn signing_secret(&self) -> Result<SigningSecret, ConfigError> {
        let encoded = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("auth.jwtSecret".to_string()))?;
        SigningSecret::from_base64(encoded)
            .map_err(|e| ConfigError::Validation(format!("auth.jwtSecret: {e}")))
    }
}

const fn default_auth_port() -> u16 {
    4005
}

const fn default_token_ttl_hours() -> u64 {
    10
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Base URL of the authentication service.
    #[serde(default = "default_auth_service_url")]
    pub auth_service_url: String,

    /// Upper bound on a single delegated token check, in milliseconds.
    #[serde(default = "default_validate_timeout_ms")]
    pub validate_timeout_ms: u64,

    /// Route table, matched in order.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            mode: BindMode::default(),
            auth_service_url: default_auth_service_url(),
            validate_timeout_ms: default_validate_timeout_ms(),
            routes: default_routes(),
        }
    }
}

impl GatewayConfig {
    /// Delegation timeout as a `Duration`.
    #[must_use]
    pub const fn validate_timeout(&self) -> Duration {
        Duration::from_millis(self.validate_timeout_ms)
    }
}

const fn default_gateway_port() -> u16 {
    4004
}

fn default_auth_service_url() -> String {
    "http://127.0.0.1:4005".to_string()
}

const fn default_validate_timeout_ms() -> u64 {
    5000
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            id: "auth-service-route".to_string(),
            path_prefix: "/auth".to_string(),
            upstream: default_auth_service_url(),
            strip_prefix: 1,
            jwt_validation: false,
        },
        RouteConfig {
            id: "patient-service-route".to_string(),
            path_prefix: "/api/patients".to_string(),
            upstream: "http://127.0.0.1:4000".to_string(),
            strip_prefix: 1,
            jwt_validation: true,
        },
    ]
}

/// A single gateway route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Route identifier (for logs).
    pub id: String,

    /// Path prefix this route owns, e.g. `/api/patients`.
    pub path_prefix: String,

    /// Upstream base URL requests are forwarded to.
    pub upstream: String,

    /// Number of leading path segments removed before forwarding.
    #[serde(default)]
    pub strip_prefix: usize,

    /// Whether requests must carry a token the auth service accepts.
    #[serde(default)]
    pub jwt_validation: bool,
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
