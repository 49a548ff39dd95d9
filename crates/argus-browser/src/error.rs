use thiserror::Error;

/// Snapshot read/write problems are logged and tolerated; the only error a
/// surf session can surface is a failing knowledge store underneath it.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("knowledge base error: {0}")]
    Knowledge(#[from] argus_knowledge::KnowledgeError),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
