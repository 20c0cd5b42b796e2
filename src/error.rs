use thiserror::Error;

/// Crate-wide error type.
///
/// Chunkserver-level faults are not represented here directly: they are
/// swallowed into [`crate::chunkserver::ChunkWriteStatus::Failed`] /
/// `None` and only escalate to a [`CcasError`] once the client's retry
/// budget against the disk set is exhausted.
#[derive(Debug, Error)]
pub enum CcasError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("chunk {digest} could not be placed on any enabled disk")]
    ChunkWriteFault { digest: String },

    #[error("chunk {digest} failed verification on every enabled disk")]
    ChunkVerifyFault { digest: String },

    #[error("no enabled disks in the chunkserver set")]
    NoEnabledDisks,

    #[error("invalid write algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] crate::catalog::CatalogError),
}

pub type Result<T> = std::result::Result<T, CcasError>;
