//! Filesystem façade: a buffered, spool-backed handle API over [`Client`],
//! plus a shadow directory tree for namespace operations (listing, stat)
//! kept separate from the content store itself.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Read as _, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::ReentrantMutex;

use crate::client::Client;
use crate::error::{CcasError, Result};

/// In-memory byte threshold before a handle's buffer spills to a temp file,
/// grounded in the original `ccasfile.py`'s `max_size_in_memory = 1024 * 64`.
const SPOOL_THRESHOLD: usize = 64 * 1024;

/// Filename marking an otherwise-empty directory in the shadow tree, hidden
/// from [`Facade::listdir`].
pub const SHADOW_DIR_SENTINEL: &str = ".__ccasfs_dir__";

fn normalize_rel(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

enum Backing {
    Memory(Vec<u8>),
    Spilled(File),
}

/// A growable byte buffer that starts in memory and spills to a temp file
/// once it exceeds [`SPOOL_THRESHOLD`], so large handles don't hold their
/// whole content resident.
struct SpooledBuffer {
    backing: Backing,
    pos: u64,
}

impl SpooledBuffer {
    fn new() -> Self {
        Self {
            backing: Backing::Memory(Vec::new()),
            pos: 0,
        }
    }

    fn from_bytes(data: Vec<u8>) -> io::Result<Self> {
        let mut buf = Self::new();
        if data.len() > SPOOL_THRESHOLD {
            let mut file = tempfile::tempfile()?;
            file.write_all(&data)?;
            buf.backing = Backing::Spilled(file);
        } else {
            buf.backing = Backing::Memory(data);
        }
        Ok(buf)
    }

    fn len(&self) -> io::Result<u64> {
        match &self.backing {
            Backing::Memory(v) => Ok(v.len() as u64),
            Backing::Spilled(f) => Ok(f.metadata()?.len()),
        }
    }

    fn spill(&mut self) -> io::Result<()> {
        if let Backing::Memory(v) = &self.backing {
            let mut file = tempfile::tempfile()?;
            file.write_all(v)?;
            file.seek(SeekFrom::Start(self.pos))?;
            self.backing = Backing::Spilled(file);
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Backing::Memory(v) = &self.backing {
            if v.len().max(self.pos as usize) + buf.len() > SPOOL_THRESHOLD {
                self.spill()?;
            }
        }
        match &mut self.backing {
            Backing::Memory(v) => {
                let pos = self.pos as usize;
                if pos + buf.len() > v.len() {
                    v.resize(pos + buf.len(), 0);
                }
                v[pos..pos + buf.len()].copy_from_slice(buf);
                self.pos += buf.len() as u64;
                Ok(buf.len())
            }
            Backing::Spilled(f) => {
                f.seek(SeekFrom::Start(self.pos))?;
                f.write_all(buf)?;
                self.pos += buf.len() as u64;
                Ok(buf.len())
            }
        }
    }

    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match &mut self.backing {
            Backing::Memory(v) => {
                let pos = self.pos as usize;
                if pos >= v.len() {
                    return Ok(0);
                }
                let n = out.len().min(v.len() - pos);
                out[..n].copy_from_slice(&v[pos..pos + n]);
                self.pos += n as u64;
                Ok(n)
            }
            Backing::Spilled(f) => {
                f.seek(SeekFrom::Start(self.pos))?;
                let n = f.read(out)?;
                self.pos += n as u64;
                Ok(n)
            }
        }
    }

    fn seek(&mut self, whence: SeekFrom) -> io::Result<u64> {
        let len = self.len()? as i64;
        let new_pos = match whence {
            SeekFrom::Start(o) => o as i64,
            SeekFrom::Current(o) => self.pos as i64 + o,
            SeekFrom::End(o) => len + o,
        };
        self.pos = new_pos.max(0) as u64;
        Ok(self.pos)
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        match &mut self.backing {
            Backing::Memory(v) => v.resize(size as usize, 0),
            Backing::Spilled(f) => f.set_len(size)?,
        }
        if self.pos > size {
            self.pos = size;
        }
        Ok(())
    }

    /// Reads the full buffer without disturbing the current position.
    fn snapshot(&mut self) -> io::Result<Vec<u8>> {
        let saved = self.pos;
        self.pos = 0;
        let len = self.len()? as usize;
        let mut out = vec![0u8; len];
        let mut read = 0;
        while read < len {
            let n = self.read(&mut out[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        self.pos = saved;
        Ok(out)
    }
}

/// How a handle was opened; governs buffer priming and commit behavior.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

struct FileHandleState {
    path: String,
    mode: OpenMode,
    buffer: SpooledBuffer,
    /// True once `buffer` holds the object's full current content (for
    /// `Write` this is true from the start -- an open-for-write always
    /// starts from an empty buffer, i.e. truncate semantics).
    loaded: bool,
    /// Length of `buffer` at the point it became authoritative, used to
    /// slice off only the newly appended tail when committing in append mode.
    committed_len: u64,
    dirty: bool,
    /// Whether the next commit should go through `write_append` rather than
    /// a full `write`. Starts true for handles opened in `Append` mode; can
    /// also flip on due to the `truncate(size)` heuristic below.
    append_on_commit: bool,
    closed: bool,
}

impl FileHandleState {
    fn ensure_loaded(&mut self, client: &Client) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let data = if client.exists(&self.path) {
            client.read(&self.path)?
        } else {
            Vec::new()
        };
        let len = data.len() as u64;
        self.buffer = SpooledBuffer::from_bytes(data)?;
        self.committed_len = len;
        self.loaded = true;
        Ok(())
    }
}

/// A handle returned by [`Facade::open`]. Cheap to hold past the façade's
/// own lifetime: it owns a cloned [`Client`] (itself an `Arc<Master>`
/// wrapper), not a reference back to the façade, so closing a handle never
/// drags the master down.
pub struct FileHandle {
    client: Client,
    index_root: PathBuf,
    state: ReentrantMutex<RefCell<FileHandleState>>,
}

impl FileHandle {
    fn new(client: Client, index_root: PathBuf, path: String, mode: OpenMode) -> Result<Self> {
        let mut state = FileHandleState {
            path,
            mode,
            buffer: SpooledBuffer::new(),
            loaded: mode != OpenMode::Read,
            committed_len: 0,
            dirty: false,
            append_on_commit: mode == OpenMode::Append,
            closed: false,
        };

        if mode == OpenMode::Append {
            state.loaded = false;
            state.ensure_loaded(&client)?;
            state.buffer.seek(SeekFrom::End(0)).map_err(CcasError::Io)?;
        }

        Ok(Self {
            client,
            index_root,
            state: ReentrantMutex::new(RefCell::new(state)),
        })
    }

    pub fn read(&self, n: usize) -> Result<Vec<u8>> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.ensure_loaded(&self.client)?;
        let mut out = vec![0u8; n];
        let read = state.buffer.read(&mut out).map_err(CcasError::Io)?;
        out.truncate(read);
        Ok(out)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.mode == OpenMode::Read {
            return Err(CcasError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle not opened for writing",
            )));
        }
        state.ensure_loaded(&self.client)?;
        state.buffer.write(bytes).map_err(CcasError::Io)?;
        state.dirty = true;
        Ok(())
    }

    pub fn seek(&self, whence: SeekFrom) -> Result<u64> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.ensure_loaded(&self.client)?;
        state.buffer.seek(whence).map_err(CcasError::Io)
    }

    /// Shrinks (or grows) the buffer to `size`. Carries over the original
    /// source's `_truncate` heuristic verbatim: if `size` equals the
    /// current offset plus one, the handle switches to append mode for its
    /// next commit. This looks accidental but downstream callers rely on
    /// it; do not silently "fix" it, since that would change commit
    /// semantics for existing callers.
    pub fn truncate(&self, size: u64) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.ensure_loaded(&self.client)?;
        let current_offset = state.buffer.pos;
        state.buffer.truncate(size).map_err(CcasError::Io)?;
        state.dirty = true;
        if size == current_offset + 1 {
            state.append_on_commit = true;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if !state.dirty {
            return Ok(());
        }

        let bytes = state.buffer.snapshot().map_err(CcasError::Io)?;
        let path = state.path.clone();

        if state.append_on_commit && self.client.exists(&path) {
            let committed_len = state.committed_len as usize;
            let tail = if bytes.len() > committed_len {
                &bytes[committed_len..]
            } else {
                &[][..]
            };
            self.client.write_append(&path, tail)?;
        } else {
            self.client.write(&path, &bytes)?;
        }

        touch_shadow_entry(&self.index_root, &path)?;

        state.committed_len = bytes.len() as u64;
        state.dirty = false;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.flush()?;
        let guard = self.state.lock();
        guard.borrow_mut().closed = true;
        Ok(())
    }
}

/// Creates the shadow entry for `path` (an empty marker file) and removes
/// any now-stale empty-dir sentinel in its parent.
fn touch_shadow_entry(index_root: &Path, path: &str) -> Result<()> {
    let rel = normalize_rel(path);
    let shadow_path = index_root.join(&rel);
    if let Some(parent) = shadow_path.parent() {
        fs::create_dir_all(parent)?;
        let sentinel = parent.join(SHADOW_DIR_SENTINEL);
        let _ = fs::remove_file(sentinel);
    }
    fs::write(&shadow_path, b"")?;
    Ok(())
}

/// Metadata surfaced by [`Facade::getinfo`]. `size` is authoritative from
/// the catalog, falling back to 0 when no catalog exists (e.g. a path only
/// ever extended via `write_append`, which does not refresh the catalog --
/// a known gap, not a bug to paper over here).
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    pub created_time: Option<SystemTime>,
    pub modified_time: Option<SystemTime>,
    pub accessed_time: Option<SystemTime>,
}

/// The filesystem façade itself: a [`Client`] plus the shadow directory
/// tree root used for listing/stat, kept separate from the content store.
pub struct Facade {
    client: Client,
    index_root: PathBuf,
}

impl Facade {
    pub fn new(client: Client, index_root: PathBuf) -> Self {
        Self { client, index_root }
    }

    pub fn open(&self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        FileHandle::new(
            self.client.clone(),
            self.index_root.clone(),
            path.to_string(),
            mode,
        )
    }

    fn shadow_path(&self, path: &str) -> PathBuf {
        self.index_root.join(normalize_rel(path))
    }

    pub fn isfile(&self, path: &str) -> bool {
        self.client.exists(path)
    }

    pub fn isdir(&self, path: &str) -> bool {
        self.shadow_path(path).is_dir()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.isfile(path) || self.isdir(path)
    }

    pub fn makedir(&self, path: &str) -> Result<()> {
        let dir = self.shadow_path(path);
        fs::create_dir_all(&dir)?;
        if fs::read_dir(&dir)?.next().is_none() {
            fs::write(dir.join(SHADOW_DIR_SENTINEL), b"")?;
        }
        Ok(())
    }

    pub fn removedir(&self, path: &str) -> Result<()> {
        fs::remove_dir_all(self.shadow_path(path))?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        self.client.delete(path)?;
        let _ = fs::remove_file(self.shadow_path(path));
        Ok(())
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.client.rename(old, new)?;
        let old_shadow = self.shadow_path(old);
        if old_shadow.is_file() {
            let new_shadow = self.shadow_path(new);
            if let Some(parent) = new_shadow.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(old_shadow, new_shadow)?;
        }
        Ok(())
    }

    pub fn listdir(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.shadow_path(path);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != SHADOW_DIR_SENTINEL {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub fn getinfo(&self, path: &str) -> Result<FileInfo> {
        let shadow = self.shadow_path(path);
        let metadata = fs::metadata(&shadow)?;
        let size = self.client.master().catalog_length(path).unwrap_or(0);
        Ok(FileInfo {
            size,
            created_time: metadata.created().ok(),
            modified_time: metadata.modified().ok(),
            accessed_time: metadata.accessed().ok(),
        })
    }

    pub fn getsize(&self, path: &str) -> Result<u64> {
        Ok(self.getinfo(path)?.size)
    }

    pub fn setcontents(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.client.write(path, bytes)?;
        touch_shadow_entry(&self.index_root, path)
    }

    pub fn getcontents(&self, path: &str) -> Result<Vec<u8>> {
        self.client.read(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::config::CcasConfig;
    use crate::master::Master;

    use super::*;

    fn facade(dir: &TempDir) -> Facade {
        let root_path_array = vec![
            Some(dir.path().join("disk0")),
            Some(dir.path().join("disk1")),
        ];
        let cfg = CcasConfig {
            root_path_array,
            manifest_path: dir.path().join("manifest"),
            index_path: dir.path().join("index"),
            catalog_path: dir.path().join("catalog"),
            tmp_path: dir.path().join("tmp"),
            write_algorithm: "mirror".to_string(),
            chunksize: 10,
        };
        let client = Client::new(Arc::new(Master::new(&cfg)));
        Facade::new(client, dir.path().join("index"))
    }

    #[test]
    fn write_batches_then_close_round_trips_and_reports_size() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);

        let handle = fac.open("/y", OpenMode::Write).unwrap();
        handle.write(b"hello ").unwrap();
        handle.write(b"world").unwrap();
        handle.close().unwrap();

        assert_eq!(fac.getcontents("/y").unwrap(), b"hello world");
        assert_eq!(fac.getsize("/y").unwrap(), 11);
    }

    #[test]
    fn read_mode_lazily_fills_from_client() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);
        fac.setcontents("/a", b"some content").unwrap();

        let handle = fac.open("/a", OpenMode::Read).unwrap();
        let data = handle.read(1024).unwrap();
        assert_eq!(data, b"some content");
    }

    #[test]
    fn append_mode_commits_only_new_tail() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);
        fac.setcontents("/a", b"hello").unwrap();

        let handle = fac.open("/a", OpenMode::Append).unwrap();
        handle.write(b"world").unwrap();
        handle.close().unwrap();

        assert_eq!(fac.getcontents("/a").unwrap(), b"helloworld");
    }

    #[test]
    fn listdir_hides_sentinel_and_shows_files() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);

        fac.makedir("/docs").unwrap();
        fac.setcontents("/docs/readme.txt", b"hi").unwrap();

        let names = fac.listdir("/docs").unwrap();
        assert_eq!(names, vec!["readme.txt".to_string()]);
    }

    #[test]
    fn makedir_on_empty_dir_writes_sentinel_removed_once_populated() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);

        fac.makedir("/empty").unwrap();
        assert!(dir
            .path()
            .join("index/empty")
            .join(SHADOW_DIR_SENTINEL)
            .exists());

        fac.setcontents("/empty/file.txt", b"x").unwrap();
        assert!(!dir
            .path()
            .join("index/empty")
            .join(SHADOW_DIR_SENTINEL)
            .exists());
    }

    #[test]
    fn remove_tombstones_content_and_clears_shadow_entry() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);
        fac.setcontents("/x", b"data").unwrap();

        fac.remove("/x").unwrap();
        assert!(!fac.isfile("/x"));
        assert!(!dir.path().join("index/x").exists());
    }

    #[test]
    fn rename_moves_content_and_shadow_entry() {
        let dir = TempDir::new().unwrap();
        let fac = facade(&dir);
        fac.setcontents("/old", b"data").unwrap();

        fac.rename("/old", "/new").unwrap();
        assert!(!fac.isfile("/old"));
        assert_eq!(fac.getcontents("/new").unwrap(), b"data");
    }
}
