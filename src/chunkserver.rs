//! A single backing disk. No in-memory index of its chunks is kept;
//! presence is checked by attempting to read.

use std::fs;
use std::path::PathBuf;

use crate::digest::{chunk_path, digest};

/// Outcome of a chunk write attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChunkWriteStatus {
    /// The chunkserver is disabled; nothing was attempted.
    NotAttempted,
    /// A file already existed at the target path with matching content.
    AlreadyPresent,
    /// The bytes were written.
    Written,
    /// An I/O fault occurred.
    Failed,
}

/// One backing disk. `enabled` is false iff the configured root is absent.
pub struct Chunkserver {
    root: Option<PathBuf>,
}

impl Chunkserver {
    /// Creates a chunkserver rooted at `root`, or a permanently disabled
    /// slot if `root` is `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    /// Writes `bytes` under `digest`. Idempotent: a pre-existing file whose
    /// content already hashes to `digest` is treated as success without a
    /// rewrite, so concurrent writers of the same digest converge without
    /// locking.
    pub fn write(&self, chunk_digest: &str, bytes: &[u8]) -> ChunkWriteStatus {
        let Some(root) = &self.root else {
            return ChunkWriteStatus::NotAttempted;
        };

        let path = chunk_path(root, chunk_digest);

        if path.exists() {
            if let Ok(existing) = fs::read(&path) {
                if digest(&existing) == chunk_digest {
                    return ChunkWriteStatus::AlreadyPresent;
                }
            }
        }

        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return ChunkWriteStatus::Failed;
            }
        }

        match fs::write(&path, bytes) {
            Ok(()) => ChunkWriteStatus::Written,
            Err(_) => ChunkWriteStatus::Failed,
        }
    }

    /// Reads the chunk named `digest`, or `None` if absent or unreadable.
    pub fn read(&self, chunk_digest: &str) -> Option<Vec<u8>> {
        let root = self.root.as_ref()?;
        fs::read(chunk_path(root, chunk_digest)).ok()
    }
}
