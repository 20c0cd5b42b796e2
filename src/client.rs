//! Chunking, per-chunk placement with retry, and read reassembly with
//! cross-replica verification.

use std::sync::Arc;

use rayon::prelude::*;

use crate::catalog::{hex_digest_to_bytes, CatalogInfo};
use crate::chunkserver::ChunkWriteStatus;
use crate::digest::digest;
use crate::error::{CcasError, Result};
use crate::master::{Master, WriteAlgorithm};

/// Splits data into chunks, drives writes across chunkservers per the
/// master's placement policy, and reassembles/verifies on read.
#[derive(Clone)]
pub struct Client {
    master: Arc<Master>,
}

impl Client {
    pub fn new(master: Arc<Master>) -> Self {
        Self { master }
    }

    pub fn master(&self) -> &Master {
        &self.master
    }

    pub fn exists(&self, path: &str) -> bool {
        self.master.exists(path)
    }

    /// `write(path, data)`: if `path` already exists it is tombstoned
    /// first, so the new manifest is authoritative and the old chunks are
    /// orphaned (not reclaimed here).
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.master.exists(path) {
            self.master.delete(path)?;
        }

        let digests = self.write_chunks(data)?;
        self.master.alloc(path, &digests)?;

        let pieces = digests
            .iter()
            .map(|d| hex_digest_to_bytes(d).expect("chunk digests are 64 hex chars"))
            .collect();
        let info = CatalogInfo::new(data.len() as u64, self.master.chunksize(), pieces);
        self.master.write_catalog(path, &info)?;

        Ok(())
    }

    /// `write_append(path, data)`: fails if `path` does not exist. The
    /// catalog is not updated here -- `getsize`/`getinfo` will report the
    /// pre-append length until the next full `write`. This is a known gap,
    /// left alone rather than quietly patched.
    pub fn write_append(&self, path: &str, data: &[u8]) -> Result<()> {
        if !self.master.exists(path) {
            return Err(CcasError::NotFound(path.to_string()));
        }

        let digests = self.write_chunks(data)?;
        self.master.alloc_append(path, &digests)
    }

    fn chunk_bounds(&self, len: usize) -> Vec<(usize, usize)> {
        let chunksize = self.master.chunksize().max(1) as usize;
        (0..len)
            .step_by(chunksize)
            .map(|start| (start, (start + chunksize).min(len)))
            .collect()
    }

    /// Splits `data` into non-overlapping chunks and places each one,
    /// returning the ordered digest list. Placement across chunks may run
    /// in parallel: the master's placement cursor is protected by a mutex,
    /// so concurrent `new_slot`/`retry_slot` calls each still advance it
    /// exactly once.
    fn write_chunks(&self, data: &[u8]) -> Result<Vec<String>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let bounds = self.chunk_bounds(data.len());
        bounds
            .into_par_iter()
            .map(|(start, end)| self.write_one_chunk(&data[start..end]))
            .collect()
    }

    fn write_one_chunk(&self, chunk: &[u8]) -> Result<String> {
        let chunk_digest = digest(chunk);
        let chunkservers = self.master.chunkservers();
        let n = chunkservers.len();

        match self.master.algorithm() {
            WriteAlgorithm::Stripe => {
                let mut slot = self.master.new_slot()?;
                let mut status = chunkservers[slot].write(&chunk_digest, chunk);

                if status == ChunkWriteStatus::Failed {
                    for _ in 0..n {
                        slot = self.master.retry_slot()?;
                        status = chunkservers[slot].write(&chunk_digest, chunk);
                        if status != ChunkWriteStatus::Failed {
                            break;
                        }
                    }
                }

                if status == ChunkWriteStatus::Failed {
                    return Err(CcasError::ChunkWriteFault {
                        digest: chunk_digest,
                    });
                }
                self.master.record_placement(&chunk_digest, slot);
            }
            WriteAlgorithm::Mirror => {
                let mut copies = 0usize;
                for (i, cs) in chunkservers.iter().enumerate() {
                    if !cs.enabled() {
                        continue;
                    }
                    if cs.write(&chunk_digest, chunk) != ChunkWriteStatus::Failed {
                        copies += 1;
                        self.master.record_placement(&chunk_digest, i);
                    }
                }
                if copies == 0 {
                    return Err(CcasError::ChunkWriteFault {
                        digest: chunk_digest,
                    });
                }
            }
        }

        Ok(chunk_digest)
    }

    /// Reassembles `path` in manifest order, verifying every chunk by
    /// digest and falling back to an N-bounded scan of the other enabled
    /// disks if the hinted slot's copy is missing or corrupt.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        if !self.master.exists(path) {
            return Err(CcasError::NotFound(path.to_string()));
        }

        let digests = self.master.get_chunkuuids(path)?;
        let chunkservers = self.master.chunkservers();
        let n = chunkservers.len();

        let mut out = Vec::new();
        for chunk_digest in digests {
            let slot = self.master.hint_slot(&chunk_digest)?;
            let mut chunk = chunkservers[slot].read(&chunk_digest);
            let mut verified = chunk.as_deref().map(|c| digest(c) == chunk_digest).unwrap_or(false);

            if !verified {
                log::warn!("chunk {chunk_digest} failed verification at slot {slot}, scanning");
                for _ in 0..n {
                    let retry = self.master.retry_slot()?;
                    let candidate = chunkservers[retry].read(&chunk_digest);
                    if candidate.as_deref().map(|c| digest(c) == chunk_digest).unwrap_or(false) {
                        self.master.record_placement(&chunk_digest, retry);
                        chunk = candidate;
                        verified = true;
                        break;
                    }
                }
            }

            if !verified {
                return Err(CcasError::ChunkVerifyFault {
                    digest: chunk_digest,
                });
            }

            out.extend(chunk.unwrap());
        }

        Ok(out)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.master.delete(path)?;
        Ok(())
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.master.rename(old, new)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::config::CcasConfig;

    use super::*;

    fn client(dir: &TempDir, disks: usize, algorithm: &str, chunksize: u64) -> Client {
        let root_path_array = (0..disks)
            .map(|i| Some(dir.path().join(format!("disk{i}"))))
            .collect();
        let cfg = CcasConfig {
            root_path_array,
            manifest_path: dir.path().join("manifest"),
            index_path: dir.path().join("index"),
            catalog_path: dir.path().join("catalog"),
            tmp_path: dir.path().join("tmp"),
            write_algorithm: algorithm.to_string(),
            chunksize,
        };
        Client::new(Arc::new(Master::new(&cfg)))
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 4, "mirror", 10);

        client.write("/a/b.txt", b"HelloWorld!!!").unwrap();
        assert_eq!(client.read("/a/b.txt").unwrap(), b"HelloWorld!!!");

        let digests = client.master().get_chunkuuids("/a/b.txt").unwrap();
        assert_eq!(digests.len(), 2);
    }

    #[test]
    fn mirror_survives_corrupted_replica() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 4, "mirror", 10);
        client.write("/a/b.txt", b"HelloWorld!!!").unwrap();

        let digests = client.master().get_chunkuuids("/a/b.txt").unwrap();
        let victim = crate::digest::chunk_path(&dir.path().join("disk0"), &digests[0]);
        std::fs::write(&victim, b"").unwrap();

        assert_eq!(client.read("/a/b.txt").unwrap(), b"HelloWorld!!!");
    }

    #[test]
    fn stripe_round_robins_across_all_enabled_slots() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 4, "stripe", 10);

        let data = b"AAAAAAAAAA".repeat(10);
        client.write("/s.bin", &data).unwrap();

        let digests = client.master().get_chunkuuids("/s.bin").unwrap();
        assert_eq!(digests.len(), 10);

        for i in 0..4 {
            let root = dir.path().join(format!("disk{i}"));
            let has_any = digests
                .iter()
                .any(|d| crate::digest::chunk_path(&root, d).exists());
            assert!(has_any, "disk {i} was never used by stripe placement");
        }
    }

    #[test]
    fn append_fails_on_missing_path() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 2, "mirror", 10);
        assert!(matches!(
            client.write_append("/z", b"x"),
            Err(CcasError::NotFound(_))
        ));
    }

    #[test]
    fn append_preserves_prefix() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 2, "mirror", 10);

        client.write("/x", b"hello").unwrap();
        client.write_append("/x", b"world").unwrap();

        assert_eq!(client.read("/x").unwrap(), b"helloworld");
    }

    #[test]
    fn overwrite_tombstones_prior_manifest() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 2, "mirror", 10);

        client.write("/x", b"hello").unwrap();
        client.write("/x", b"world").unwrap();

        assert_eq!(client.read("/x").unwrap(), b"world");

        let hidden = dir.path().join("manifest").join("hidden").join("deleted");
        assert!(hidden.exists());
    }

    #[test]
    fn read_of_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir, 2, "mirror", 10);
        assert!(matches!(client.read("/z"), Err(CcasError::NotFound(_))));
    }
}
