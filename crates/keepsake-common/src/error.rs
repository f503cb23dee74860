use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeepsakeError {
    #[error("Unsupported repository URI: {0} (only file:// and local paths are supported)")]
    UnsupportedRepository(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Ambiguous experiment id {prefix}: matches {count} experiments")]
    AmbiguousId { prefix: String, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeepsakeError {
    /// True for lookups that failed because nothing matched the id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeepsakeError::ExperimentNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, KeepsakeError>;
