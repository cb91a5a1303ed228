//! Domain-level error taxonomy for semrefactor.

use crate::backup::BackupError;
use crate::generation::GenerationError;
use crate::search::SearchError;

/// Errors that can halt a refactoring pipeline.
///
/// Per-file generation and write failures never surface here; the executor
/// records them on the [`ExecutionResult`](crate::domain::ExecutionResult).
#[derive(Debug, thiserror::Error)]
pub enum RefactorError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] SearchError),

    #[error("backup failed: {0}")]
    Backup(#[source] BackupError),

    #[error("restore failed: {0}")]
    Restore(#[source] BackupError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for semrefactor domain operations.
pub type Result<T> = std::result::Result<T, RefactorError>;
