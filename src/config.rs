//! Configuration for the autostop control clients and CLI.
//!
//! Credentials are read from the environment once at startup and threaded
//! explicitly through every client; there is no ambient global state.
use crate::logging::LoggingConfig;
use duration_str::deserialize_duration;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable holding the vendor API key.
pub const API_KEY_ENV_VAR: &str = "HARNESS_PLATFORM_API_KEY";
/// Environment variable holding the vendor account identifier.
pub const ACCOUNT_ID_ENV_VAR: &str = "HARNESS_ACCOUNT_ID";

const DEFAULT_BASE_URL: &str = "https://app.harness.io";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable `{0}`")]
    MissingEnvVar(&'static str),

    #[error("could not read config file `{path}`: `{err}`")]
    FileRead { path: String, err: String },

    #[error("error deserializing YAML config: `{0}`")]
    SerdeYaml(#[from] serde_yaml::Error),
}

/// Top-level configuration, loadable from an optional YAML file. Every field
/// has a default so an empty (or missing) file is valid.
#[derive(Debug, Deserialize, Default, PartialEq, Clone)]
pub struct AutostopConfig {
    #[serde(default)]
    pub log: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

impl AutostopConfig {
    /// Loads the configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::FileRead {
            path: path.to_string_lossy().into(),
            err: err.to_string(),
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Vendor endpoint settings.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Url,

    /// Overall request timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Connect timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub conn_timeout: Duration,

    pub proxy_url: Option<Url>,

    /// Attempts for idempotent list/get calls. Creates are never retried.
    pub retry_attempts: usize,

    #[serde(deserialize_with = "deserialize_duration")]
    pub retry_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url must parse"),
            timeout: DEFAULT_TIMEOUT,
            conn_timeout: DEFAULT_CONN_TIMEOUT,
            proxy_url: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Vendor credentials, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub account_id: String,
}

impl ApiCredentials {
    /// Reads the credentials from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_ENV_VAR)
            .map_err(|_| ConfigError::MissingEnvVar(API_KEY_ENV_VAR))?;
        let account_id = std::env::var(ACCOUNT_ID_ENV_VAR)
            .map_err(|_| ConfigError::MissingEnvVar(ACCOUNT_ID_ENV_VAR))?;
        Ok(Self {
            api_key,
            account_id,
        })
    }
}
