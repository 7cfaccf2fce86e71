use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::model_runtime::generation::{GenerationSettings, DEFAULT_MAX_LENGTH, DEFAULT_SEED};
use crate::model_runtime::source::model_name_from_path;
use crate::model_runtime::types::ModelKind;

pub const DEFAULT_MODEL_PATH: &str = "/app/model";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8093;
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: String,
    pub model_name: String,
    pub model_type: ModelKind,
    pub api_host: String,
    pub api_port: u16,
    pub device: String,
    pub max_sequence_length: usize,
    pub generation: GenerationSettings,
    pub request_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            model_name: model_name_from_path(Path::new(DEFAULT_MODEL_PATH)),
            model_type: ModelKind::Embedding,
            api_host: DEFAULT_HOST.to_string(),
            api_port: DEFAULT_PORT,
            device: "cpu".to_string(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            generation: GenerationSettings::default(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_path: Option<String>,
    pub model_name: Option<String>,
    pub model_type: Option<ModelKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub device: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, the process
    /// environment in production.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.into());
        let model_name = lookup("MODEL_NAME")
            .unwrap_or_else(|| model_name_from_path(Path::new(&model_path)));

        let model_type = match lookup("MODEL_TYPE") {
            Some(value) => value
                .parse::<ModelKind>()
                .context("MODEL_TYPE must be one of embedding, reranker, llm")?,
            None => ModelKind::Embedding,
        };

        let generation = GenerationSettings {
            max_length: parse_var(&lookup, "GENERATE_MAX_LENGTH", DEFAULT_MAX_LENGTH)?,
            max_new_tokens: parse_optional(&lookup, "GENERATE_MAX_NEW_TOKENS")?,
            temperature: parse_optional(&lookup, "GENERATE_TEMPERATURE")?,
            top_p: parse_optional(&lookup, "GENERATE_TOP_P")?,
            seed: parse_var(&lookup, "GENERATE_SEED", DEFAULT_SEED)?,
        };
        if generation.max_length == 0 {
            anyhow::bail!("GENERATE_MAX_LENGTH must be greater than zero");
        }

        let max_sequence_length =
            parse_var(&lookup, "MAX_SEQUENCE_LENGTH", DEFAULT_MAX_SEQUENCE_LENGTH)?;
        if max_sequence_length == 0 {
            anyhow::bail!("MAX_SEQUENCE_LENGTH must be greater than zero");
        }

        Ok(Self {
            model_path,
            model_name,
            model_type,
            api_host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
            api_port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            device: lookup("DEVICE").unwrap_or_else(|| "cpu".into()),
            max_sequence_length,
            generation,
            request_timeout_seconds: parse_var(
                &lookup,
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?,
        })
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(model_path) = overrides.model_path {
            // a name derived from the old path follows the new one
            if overrides.model_name.is_none()
                && self.model_name == model_name_from_path(Path::new(&self.model_path))
            {
                self.model_name = model_name_from_path(Path::new(&model_path));
            }
            self.model_path = model_path;
        }
        if let Some(model_name) = overrides.model_name {
            self.model_name = model_name;
        }
        if let Some(model_type) = overrides.model_type {
            self.model_type = model_type;
        }
        if let Some(host) = overrides.host {
            self.api_host = host;
        }
        if let Some(port) = overrides.port {
            self.api_port = port;
        }
        if let Some(device) = overrides.device {
            self.device = device;
        }
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Model Path: {}", self.model_path);
        info!("- Model Name: {}", self.model_name);
        info!("- Model Type: {}", self.model_type);
        info!("- Device: {}", self.device);
        info!("- Max Sequence Length: {}", self.max_sequence_length);
        info!(
            "- Generation: max_length {}, max_new_tokens {:?}, temperature {:?}, top_p {:?}",
            self.generation.max_length,
            self.generation.max_new_tokens,
            self.generation.temperature,
            self.generation.top_p
        );
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
    }

    /// Host and port in the form accepted by `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match parse_optional(lookup, key)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value {:?} for {}: {}", raw, key, e)),
        None => Ok(None),
    }
}
