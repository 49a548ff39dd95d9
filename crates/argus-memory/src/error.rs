use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("duplicate summary for context hash {context_hash}")]
    DuplicateSummary { context_hash: String },
}

pub type Result<T> = std::result::Result<T, MemoryError>;
