use serde::Deserialize;
use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// An enum representing possible errors during the logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

/// Defines the logging configuration for the application.
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub(crate) level: LogLevel,
    /// Whether the target of each trace event is included in the output.
    #[serde(default)]
    pub(crate) target: bool,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl LoggingConfig {
    /// Attempts to initialize the global logging subscriber with the inner
    /// configuration. The `LOG_LEVEL` environment variable overrides the
    /// configured level.
    pub fn try_init(&self) -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_target(self.target)
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::from(&self.level).into())
                    .with_env_var("LOG_LEVEL")
                    .from_env_lossy(),
            )
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError(
                    "unable to set the global logging subscriber".to_string(),
                )
            })
    }
}
