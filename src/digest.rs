//! Chunk naming: hex-encoded SHA-256 over bytes, and the fan-out directory
//! derivation used to lay chunk files out on a backing disk.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Width, in hex characters, of each fan-out segment.
pub const FANOUT_WIDTH: usize = 2;

/// Number of fan-out segments taken from a digest's prefix.
pub const FANOUT_DEPTH: usize = 4;

/// Length in hex characters of a SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Returns the lowercase hex SHA-256 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    base16ct::lower::encode_string(&hasher.finalize())
}

/// Splits `digest` into `depth` fixed-`width` hex prefix segments.
///
/// Panics if `digest` is shorter than `width * depth` characters; callers
/// only ever pass digests produced by [`digest`], which are always
/// [`DIGEST_HEX_LEN`] characters long.
pub fn fanout(digest: &str, width: usize, depth: usize) -> Vec<String> {
    (0..depth)
        .map(|i| digest[i * width..(i + 1) * width].to_string())
        .collect()
}

/// Builds the on-disk path for a chunk: `<disk_root>/<p1>/<p2>/<p3>/<p4>/<digest>`.
pub fn chunk_path(disk_root: &Path, digest: &str) -> PathBuf {
    let mut path = disk_root.to_path_buf();
    for segment in fanout(digest, FANOUT_WIDTH, FANOUT_DEPTH) {
        path.push(segment);
    }
    path.push(digest);
    path
}
