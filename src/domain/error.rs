use thiserror::Error;

pub type Result<T> = std::result::Result<T, FiscalOpsError>;

#[derive(Error, Debug)]
pub enum FiscalOpsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Secret backend error: {0}")]
    Secret(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FiscalOpsError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FiscalOpsError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        FiscalOpsError::Validation(msg.into())
    }

    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        FiscalOpsError::Fetch(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        FiscalOpsError::Internal(msg.into())
    }
}
