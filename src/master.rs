//! Placement, manifest and catalog persistence, existence/rename/delete.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::catalog::CatalogInfo;
use crate::chunkserver::Chunkserver;
use crate::config::CcasConfig;
use crate::error::{CcasError, Result};

/// Chunk placement policy across the disk set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteAlgorithm {
    Stripe,
    Mirror,
}

impl Default for WriteAlgorithm {
    fn default() -> Self {
        WriteAlgorithm::Mirror
    }
}

impl WriteAlgorithm {
    /// Parses `s`, collapsing anything outside `{stripe, mirror}` to
    /// `mirror` for safety rather than failing construction. Used by
    /// [`Master::new`]; the façade layer validates the raw string itself
    /// and rejects bad values outright before construction ever reaches
    /// here.
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => WriteAlgorithm::Stripe,
            "mirror" => WriteAlgorithm::Mirror,
            other => {
                log::warn!("unknown write_algorithm {other:?}, defaulting to mirror");
                WriteAlgorithm::Mirror
            }
        }
    }

    pub fn is_valid_str(s: &str) -> bool {
        matches!(s.to_ascii_lowercase().as_str(), "stripe" | "mirror")
    }
}

fn normalize_rel(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Coordinates placement, manifest/catalog persistence, and
/// existence/rename/delete. Owns the disk set and the placement cursor.
pub struct Master {
    chunkservers: Vec<Chunkserver>,
    manifest_root: PathBuf,
    catalog_root: PathBuf,
    tmp_root: PathBuf,
    chunksize: u64,
    algorithm: WriteAlgorithm,
    cursor: Mutex<usize>,
    /// Opportunistic, process-local digest -> slot index built at write
    /// time. Purely a faster first guess for `hint_slot`; the read
    /// protocol's verify+retry loop is authoritative regardless of whether
    /// an entry is present or correct.
    chunk_index: Mutex<HashMap<String, usize>>,
}

impl Master {
    pub fn new(config: &CcasConfig) -> Self {
        let chunkservers = config
            .root_path_array
            .iter()
            .map(|root| Chunkserver::new(root.clone()))
            .collect();

        Self {
            chunkservers,
            manifest_root: config.manifest_path.clone(),
            catalog_root: config.catalog_path.clone(),
            tmp_root: config.tmp_path.clone(),
            chunksize: config.chunksize,
            algorithm: WriteAlgorithm::parse_lenient(&config.write_algorithm),
            cursor: Mutex::new(0),
            chunk_index: Mutex::new(HashMap::new()),
        }
    }

    pub fn chunkservers(&self) -> &[Chunkserver] {
        &self.chunkservers
    }

    pub fn disk_count(&self) -> usize {
        self.chunkservers.len()
    }

    pub fn chunksize(&self) -> u64 {
        self.chunksize
    }

    pub fn algorithm(&self) -> WriteAlgorithm {
        self.algorithm
    }

    /// Shared cursor step used by `new_slot`, `retry_slot`, and the
    /// fallback path of `hint_slot`: advance while the current slot is
    /// disabled, record the current value as selected, advance once more.
    /// Fails outright rather than spinning if no slot is enabled at all.
    fn advance_and_select(&self) -> Result<usize> {
        let n = self.chunkservers.len();
        assert!(n > 0, "disk set must not be empty");

        if !self.chunkservers.iter().any(Chunkserver::enabled) {
            return Err(CcasError::NoEnabledDisks);
        }

        let mut cursor = self.cursor.lock().unwrap();
        while !self.chunkservers[*cursor].enabled() {
            *cursor = (*cursor + 1) % n;
        }
        let selected = *cursor;
        *cursor = (*cursor + 1) % n;
        Ok(selected)
    }

    /// Selects the next slot for a new chunk placement (stripe, or a single
    /// mirror success check).
    pub fn new_slot(&self) -> Result<usize> {
        self.advance_and_select()
    }

    /// Selects the next slot to retry a failed write or a failed read
    /// verification against.
    pub fn retry_slot(&self) -> Result<usize> {
        self.advance_and_select()
    }

    /// Advisory read placement hint: consults the opportunistic placement
    /// index first, falling back to the same round-robin cursor used for
    /// writes. Correctness never depends on this being right.
    pub fn hint_slot(&self, chunk_digest: &str) -> Result<usize> {
        if let Some(&slot) = self.chunk_index.lock().unwrap().get(chunk_digest) {
            if self.chunkservers[slot].enabled() {
                return Ok(slot);
            }
        }
        self.advance_and_select()
    }

    /// Records that `chunk_digest` was successfully placed on `slot`, for
    /// `hint_slot` to consult later.
    pub fn record_placement(&self, chunk_digest: &str, slot: usize) {
        self.chunk_index
            .lock()
            .unwrap()
            .insert(chunk_digest.to_string(), slot);
    }

    fn manifest_path(&self, path: &str) -> PathBuf {
        self.manifest_root.join(normalize_rel(path))
    }

    fn catalog_path(&self, path: &str) -> PathBuf {
        self.catalog_root.join(normalize_rel(path))
    }

    /// Overwrites the manifest file with the newline-joined digest list.
    pub fn alloc(&self, path: &str, digests: &[String]) -> Result<()> {
        let manifest_path = self.manifest_path(path);
        if let Some(parent) = manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&manifest_path, digests.join("\n"))?;
        Ok(())
    }

    /// Reads the existing manifest, appends `extra`, and rewrites it.
    pub fn alloc_append(&self, path: &str, extra: &[String]) -> Result<()> {
        let mut digests = self.get_chunkuuids(path)?;
        digests.extend_from_slice(extra);
        self.alloc(path, &digests)
    }

    /// Moves a pre-built catalog record into place.
    pub fn write_catalog(&self, path: &str, info: &CatalogInfo) -> Result<()> {
        fs::create_dir_all(&self.tmp_root)?;
        let tmp_file = self.tmp_root.join(format!(
            "catalog-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::write(&tmp_file, info.to_bytes())?;

        let catalog_path = self.catalog_path(path);
        if let Some(parent) = catalog_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&tmp_file, &catalog_path)?;
        Ok(())
    }

    /// Recovers just `info.length` from the catalog, or `None` if no
    /// catalog exists for `path` (e.g. a path that has only ever been
    /// written via `alloc_append`, which does not write a catalog entry).
    pub fn catalog_length(&self, path: &str) -> Option<u64> {
        let bytes = fs::read(self.catalog_path(path)).ok()?;
        CatalogInfo::length_only(&bytes).ok()
    }

    pub fn get_chunkuuids(&self, path: &str) -> Result<Vec<String>> {
        let manifest_path = self.manifest_path(path);
        let text = fs::read_to_string(&manifest_path)
            .map_err(|_| CcasError::NotFound(path.to_string()))?;

        Ok(text
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.manifest_path(path).is_file()
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let old_path = self.manifest_path(old);
        let new_path = self.manifest_path(new);
        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(old_path, new_path)?;

        // Catalog, if any, moves along with the manifest.
        let old_catalog = self.catalog_path(old);
        if old_catalog.is_file() {
            let new_catalog = self.catalog_path(new);
            if let Some(parent) = new_catalog.parent() {
                fs::create_dir_all(parent)?;
            }
            let _ = fs::rename(old_catalog, new_catalog);
        }
        Ok(())
    }

    fn tombstone_path(&self, original: &str) -> PathBuf {
        let now = SystemTime::now();
        let datetime: DateTime<Utc> = now.into();
        let iso = datetime.format("%Y%m%dT%H%M%SZ").to_string();
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap();
        let epoch = format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros());

        self.manifest_root
            .join("hidden")
            .join("deleted")
            .join(iso)
            .join(epoch)
            .join(normalize_rel(original))
    }

    /// Renames the manifest to a tombstoned path under `hidden/deleted/...`.
    /// Chunks are untouched; idempotent tombstone creation is not
    /// guaranteed.
    pub fn delete(&self, path: &str) -> Result<PathBuf> {
        let manifest_path = self.manifest_path(path);
        let tombstone = self.tombstone_path(path);
        if let Some(parent) = tombstone.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&manifest_path, &tombstone)?;
        log::debug!("tombstoned {path} to {}", tombstone.display());
        Ok(tombstone)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir, disks: usize, algorithm: &str) -> CcasConfig {
        let root_path_array = (0..disks)
            .map(|i| Some(dir.path().join(format!("disk{i}"))))
            .collect();
        CcasConfig {
            root_path_array,
            manifest_path: dir.path().join("manifest"),
            index_path: dir.path().join("index"),
            catalog_path: dir.path().join("catalog"),
            tmp_path: dir.path().join("tmp"),
            write_algorithm: algorithm.to_string(),
            chunksize: 10,
        }
    }

    #[test]
    fn cursor_skips_disabled_slots() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, 4, "mirror");
        cfg.root_path_array[2] = None;
        let master = Master::new(&cfg);

        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(master.new_slot().unwrap());
        }
        assert!(!seen.contains(&2));
    }

    #[test]
    fn all_disks_disabled_faults_instead_of_hanging() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, 3, "mirror");
        cfg.root_path_array = vec![None, None, None];
        let master = Master::new(&cfg);

        assert!(matches!(master.new_slot(), Err(CcasError::NoEnabledDisks)));
        assert!(matches!(master.retry_slot(), Err(CcasError::NoEnabledDisks)));
        assert!(matches!(
            master.hint_slot("deadbeef"),
            Err(CcasError::NoEnabledDisks)
        ));
    }

    #[test]
    fn invalid_algorithm_collapses_to_mirror() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 2, "raid5");
        let master = Master::new(&cfg);
        assert_eq!(master.algorithm(), WriteAlgorithm::Mirror);
    }

    #[test]
    fn manifest_round_trips_through_alloc() {
        let dir = TempDir::new().unwrap();
        let master = Master::new(&config(&dir, 2, "mirror"));

        let digests = vec!["aa".to_string(), "bb".to_string()];
        master.alloc("/a/b.txt", &digests).unwrap();
        assert!(master.exists("a/b.txt"));
        assert_eq!(master.get_chunkuuids("/a/b.txt").unwrap(), digests);
    }

    #[test]
    fn alloc_append_extends_manifest() {
        let dir = TempDir::new().unwrap();
        let master = Master::new(&config(&dir, 2, "mirror"));

        master.alloc("f", &["aa".to_string()]).unwrap();
        master.alloc_append("f", &["bb".to_string()]).unwrap();
        assert_eq!(
            master.get_chunkuuids("f").unwrap(),
            vec!["aa".to_string(), "bb".to_string()]
        );
    }

    #[test]
    fn manifest_tolerates_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let master = Master::new(&config(&dir, 2, "mirror"));
        let manifest_path = dir.path().join("manifest").join("f");
        fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();
        fs::write(&manifest_path, "aa\nbb\n").unwrap();
        assert_eq!(
            master.get_chunkuuids("f").unwrap(),
            vec!["aa".to_string(), "bb".to_string()]
        );
    }

    #[test]
    fn delete_tombstones_under_hidden_deleted() {
        let dir = TempDir::new().unwrap();
        let master = Master::new(&config(&dir, 2, "mirror"));
        master.alloc("f", &["aa".to_string()]).unwrap();

        let tombstone = master.delete("f").unwrap();
        assert!(!master.exists("f"));
        assert!(tombstone.starts_with(dir.path().join("manifest").join("hidden").join("deleted")));
    }
}
