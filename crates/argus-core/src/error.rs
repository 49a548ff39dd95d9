use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signature verification failed: {0}")]
    Unauthorized(String),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArgusError {
    /// Short error code string for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            ArgusError::Config(_) => "CONFIG_ERROR",
            ArgusError::Unauthorized(_) => "UNAUTHORIZED",
            ArgusError::Provider(_) => "PROVIDER_ERROR",
            ArgusError::Serialization(_) => "SERIALIZATION_ERROR",
            ArgusError::Io(_) => "IO_ERROR",
            ArgusError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArgusError>;
