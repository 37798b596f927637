//! # medgate Core
//!
//! Types shared by the authentication service and the edge gateway.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - The signing secret wrapper (redacted, zeroized on drop)
//! - Identifier validation and normalization, bearer header parsing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod validation;

pub use config::{
    AuthServiceConfig, BindMode, Config, ConfigError, GatewayConfig, LogFormat,
    MAX_TOKEN_TTL_HOURS, RouteConfig,
};
pub use secrets::{SecretError, SigningSecret};
pub use validation::{ValidationError, bearer_token, normalize_identifier};
