use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] argus_core::provider::ProviderError),

    #[error("memory error: {0}")]
    Memory(#[from] argus_memory::MemoryError),

    #[error("knowledge error: {0}")]
    Knowledge(#[from] argus_knowledge::KnowledgeError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
