//! Environment-backed animal detection configuration.
//!
//! Used by deployments that do not keep the configuration in the database;
//! the worker picks it with `FAUNA_CONFIG_SOURCE=env`.
//! Variables are read on every call, so an updated environment (for example a
//! re-read `.env` file) is picked up by the next asset.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FAUNA_ANIMAL_DETECTION_ENABLED` | `true` | Enable/disable the feature |
//! | `FAUNA_ANIMAL_MODEL` | `resnet34` | Model name, empty for the service default |
//! | `FAUNA_ANIMAL_MIN_SCORE` | `0.5` | Minimum detection score |
//! | `FAUNA_ML_URLS` | `http://127.0.0.1:3003` | Comma-separated endpoints |

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::AnimalDetectionConfig;
use crate::traits::ConfigProvider;

/// Where animal detection configuration is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// The `animal_detection` row in `system_metadata`.
    #[default]
    Database,
    /// `FAUNA_*` environment variables, see [`EnvConfigProvider`].
    Env,
}

impl FromStr for ConfigSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(Self::Database),
            "env" | "environment" => Ok(Self::Env),
            other => Err(format!(
                "unknown config source '{}', expected 'database' or 'env'",
                other
            )),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Env => write!(f, "env"),
        }
    }
}

/// [`ConfigProvider`] reading `FAUNA_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider;

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn config_from<F>(lookup: F) -> Result<AnimalDetectionConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AnimalDetectionConfig::default();

        if let Some(v) = lookup(defaults::ENV_ANIMAL_DETECTION_ENABLED) {
            config.enabled = v != "false" && v != "0";
        }

        if let Some(v) = lookup(defaults::ENV_ANIMAL_MODEL) {
            let v = v.trim();
            config.model_name = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }

        if let Some(v) = lookup(defaults::ENV_ANIMAL_MIN_SCORE) {
            let score = v.trim().parse::<f32>().map_err(|e| {
                Error::Config(format!(
                    "{} must be a number: {}",
                    defaults::ENV_ANIMAL_MIN_SCORE,
                    e
                ))
            })?;
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    defaults::ENV_ANIMAL_MIN_SCORE,
                    score
                )));
            }
            config.min_score = score;
        }

        if let Some(v) = lookup(defaults::ENV_ML_URLS) {
            let endpoints = parse_endpoints(&v);
            if !endpoints.is_empty() {
                config.inference_endpoints = endpoints;
            }
        }

        Ok(config)
    }
}

/// Split a comma-separated endpoint list, dropping blanks and trailing slashes.
pub fn parse_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl ConfigProvider for EnvConfigProvider {
    async fn animal_detection_config(&self) -> Result<AnimalDetectionConfig> {
        Self::config_from(|key| std::env::var(key).ok())
    }
}
