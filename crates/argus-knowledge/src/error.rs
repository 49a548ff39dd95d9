use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("content too short to learn ({len} chars)")]
    ContentTooShort { len: usize },

    #[error("duplicate content hash {hash}")]
    DuplicateContent { hash: String },

    #[error("embedding failed: {0}")]
    Provider(#[from] argus_core::provider::ProviderError),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
