use thiserror::Error;

/// Errors that can occur while reading health samples
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Health data unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to parse health export: {0}")]
    ParseError(String),
}

/// Errors that can occur during AI analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Backend communication failed: {0}")]
    BackendError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::HttpError(err.to_string())
        }
    }
}

/// Errors that can occur when showing a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to show notification: {0}")]
    NotificationFailed(String),
}

/// Errors raised by the local SQLite store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database connection poisoned")]
    Poisoned,

    #[error("Database task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised by the chat service
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
