//! Configuration types for the engine and server.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::str::FromStr;

/// Evolution run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Upper bound on generations computed per run
    pub max_attempts: NonZeroU32,
}

impl EvolutionConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(Self::DEFAULT_MAX_ATTEMPTS)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Database path (SQLite)
    pub database_path: String,
    /// OpenTelemetry endpoint
    pub otel_endpoint: Option<String>,
    /// Evolution parameters
    pub evolution: EvolutionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "./data/life.db".to_string(),
            otel_endpoint: None,
            evolution: EvolutionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    ///
    /// Recognised keys: `LIFE_BIND_ADDRESS`, `LIFE_PORT`, `LIFE_DATABASE_PATH`,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`, `MAX_FINAL_STATE_ATTEMPTS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("LIFE_BIND_ADDRESS") {
            config.bind_address = val;
        }
        if let Some(val) = lookup("LIFE_PORT") {
            config.port = parse_var("LIFE_PORT", &val)?;
        }
        if let Some(val) = lookup("LIFE_DATABASE_PATH") {
            config.database_path = val;
        }
        if let Some(val) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            if !val.trim().is_empty() {
                config.otel_endpoint = Some(val);
            }
        }
        if let Some(val) = lookup("MAX_FINAL_STATE_ATTEMPTS") {
            config.evolution.max_attempts = parse_var("MAX_FINAL_STATE_ATTEMPTS", &val)?;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        Error::Validation(format!("{} has invalid value '{}'", key, raw))
    })
}
