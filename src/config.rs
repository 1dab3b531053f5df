//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the token signing key) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::engine::BusinessRules;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub bootstrap: BootstrapConfig,
    /// Scoring rules. Missing keys take the standard company values.
    #[serde(default)]
    pub rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Env var that, when set, overrides `port`.
    #[serde(default)]
    pub port_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret_env: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapConfig {
    pub enabled: bool,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Listening port, honouring the override variable when it parses.
    pub fn port(&self) -> u16 {
        self.server
            .port_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.server.port)
    }

    /// Token signing secret. Falls back to a per-process random key, so
    /// tokens stop validating after a restart.
    pub fn jwt_secret(&self) -> Secret<String> {
        match Self::resolve_env(&self.auth.jwt_secret_env) {
            Ok(s) if !s.is_empty() => Secret::new(s),
            _ => {
                warn!(
                    env = %self.auth.jwt_secret_env,
                    "No JWT secret configured, using an ephemeral key"
                );
                Secret::new(format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4()))
            }
        }
    }
}
