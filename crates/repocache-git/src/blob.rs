//! Snapshot blob store: repository bundles cached across sessions.
//!
//! Blobs are stored one file per URL, named by the SHA-256 of the URL. The
//! total size is tracked in a `.repocache-snapshot-size` metadata file so
//! eviction does not need a full directory walk on every store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use repocache_util::hash::url_key;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const SIZE_FILE: &str = ".repocache-snapshot-size";
const BLOB_EXT: &str = "bundle";

/// Durable storage for small repository snapshots, keyed by URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `size` bytes read from `reader` as the snapshot for `url`,
    /// replacing any previous one.
    async fn store(
        &self,
        ctx: &CancellationToken,
        url: &str,
        size: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> RepoCacheResult<()>;

    /// Copy the snapshot for `url` into `writer`. Returns `false` if none exists.
    async fn load(
        &self,
        ctx: &CancellationToken,
        url: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> RepoCacheResult<bool>;
}

/// Filesystem blob store with per-blob and total size limits.
///
/// When the total exceeds its budget, the least recently stored or loaded
/// blobs are removed first.
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    max_blob_bytes: u64,
    max_total_bytes: u64,
    lock: Mutex<()>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, max_blob_bytes: u64, max_total_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_blob_bytes,
            max_total_bytes,
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a snapshot exists for `url`.
    pub fn contains(&self, url: &str) -> bool {
        self.blob_path(url).is_file()
    }

    /// Total size of stored blobs in bytes (tracked, with a full-walk fallback).
    pub fn size(&self) -> u64 {
        self.read_tracked_size().unwrap_or_else(|| {
            let actual = self.walk_size();
            self.write_tracked_size(actual);
            actual
        })
    }

    /// Number of stored blobs.
    pub fn entry_count(&self) -> usize {
        self.blobs().len()
    }

    /// Remove every blob. Returns the number of bytes freed.
    pub fn clean(&self) -> RepoCacheResult<u64> {
        let size = self.size();
        if self.root.is_dir() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(size)
    }

    fn blob_path(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.{BLOB_EXT}", url_key(url)))
    }

    fn size_file_path(&self) -> PathBuf {
        self.root.join(SIZE_FILE)
    }

    fn read_tracked_size(&self) -> Option<u64> {
        fs::read_to_string(self.size_file_path())
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
    }

    fn write_tracked_size(&self, size: u64) {
        if let Err(e) = fs::create_dir_all(&self.root) {
            tracing::warn!(
                "Failed to create snapshot root {}: {e}",
                self.root.display()
            );
            return;
        }
        if let Err(e) = fs::write(self.size_file_path(), size.to_string()) {
            tracing::warn!(
                "Failed to write snapshot size file {}: {e}",
                self.size_file_path().display()
            );
        }
    }

    /// Blob files with their size and last-use time.
    fn blobs(&self) -> Vec<(PathBuf, u64, SystemTime)> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == BLOB_EXT))
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                meta.is_file().then(|| {
                    let used = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    (e.path(), meta.len(), used)
                })
            })
            .collect()
    }

    fn walk_size(&self) -> u64 {
        self.blobs().iter().map(|(_, len, _)| len).sum()
    }

    fn evict_if_needed(&self, keep: &Path) {
        let mut current = self.size();
        if current <= self.max_total_bytes {
            return;
        }

        let mut blobs = self.blobs();
        // Oldest first
        blobs.sort_by_key(|(_, _, used)| *used);

        for (path, len, _) in &blobs {
            if current <= self.max_total_bytes {
                break;
            }
            if path == keep {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!("evicted snapshot {}", path.display());
                    current = current.saturating_sub(*len);
                }
                Err(e) => tracing::warn!("Failed to evict snapshot {}: {e}", path.display()),
            }
        }

        self.write_tracked_size(current);
    }

    fn blob_err(&self, url: &str, e: impl std::fmt::Display) -> RepoCacheError {
        RepoCacheError::Blob {
            message: format!("{url}: {e}"),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(
        &self,
        ctx: &CancellationToken,
        url: &str,
        size: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> RepoCacheResult<()> {
        if size > self.max_blob_bytes {
            return Err(self.blob_err(
                url,
                format!("{size} bytes exceeds the {} byte limit", self.max_blob_bytes),
            ));
        }
        let _guard = self.lock.lock().await;

        fs::create_dir_all(&self.root).map_err(|e| self.blob_err(url, e))?;
        let (file, tmp_path) = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| self.blob_err(url, e))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut limited = (&mut *reader).take(self.max_blob_bytes.saturating_add(1));
        let written = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RepoCacheError::Cancelled),
            copied = tokio::io::copy(&mut limited, &mut file) => {
                copied.map_err(|e| self.blob_err(url, e))?
            }
        };
        if written > self.max_blob_bytes {
            return Err(self.blob_err(url, "blob grew past the size limit while storing"));
        }
        file.flush().await.map_err(|e| self.blob_err(url, e))?;
        drop(file);

        let dest = self.blob_path(url);
        let replaced = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
        let before = self.size();
        tmp_path.persist(&dest).map_err(|e| self.blob_err(url, e))?;

        let total = before.saturating_sub(replaced).saturating_add(written);
        self.write_tracked_size(total);
        tracing::debug!("stored {written} byte snapshot for {url}");

        self.evict_if_needed(&dest);
        Ok(())
    }

    async fn load(
        &self,
        ctx: &CancellationToken,
        url: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> RepoCacheResult<bool> {
        let path = self.blob_path(url);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.blob_err(url, e)),
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RepoCacheError::Cancelled),
            copied = tokio::io::copy(&mut file, writer) => {
                copied.map_err(|e| self.blob_err(url, e))?;
            }
        }
        writer.flush().await.map_err(|e| self.blob_err(url, e))?;

        // Mark as recently used for eviction ordering.
        if let Err(e) = file.into_std().await.set_modified(SystemTime::now()) {
            tracing::warn!("Failed to touch snapshot {}: {e}", path.display());
        }
        Ok(true)
    }
}
