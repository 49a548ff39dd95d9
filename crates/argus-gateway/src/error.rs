use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("memory error: {0}")]
    Memory(#[from] argus_memory::MemoryError),

    #[error("knowledge error: {0}")]
    Knowledge(#[from] argus_knowledge::KnowledgeError),

    #[error("media error: {0}")]
    Media(#[from] argus_core::provider::ProviderError),

    #[error("signature verification failed: {0}")]
    Unauthorized(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
