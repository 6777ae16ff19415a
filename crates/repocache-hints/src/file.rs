//! Hint store persisted as a single JSON document on local disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repocache_core::hints::{lookup, overwrite};
use repocache_core::HintMap;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::store::HintStore;

/// JSON-file hint store: `{ "identifier": ["url", ...], ... }`.
///
/// Saves are read-merge-replace and serialized within the process; the file
/// is swapped in atomically so readers never see a partial document.
#[derive(Debug)]
pub struct FileHintStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. A missing file is an empty map.
    pub async fn load(&self) -> std::io::Result<HintMap> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(HintMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HintMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Remove the document. Returns whether a file was deleted.
    pub async fn clear(&self) -> std::io::Result<bool> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl HintStore for FileHintStore {
    async fn resolve(
        &self,
        ctx: &CancellationToken,
        identifiers: &[String],
    ) -> RepoCacheResult<Vec<String>> {
        if ctx.is_cancelled() {
            return Err(RepoCacheError::Cancelled);
        }
        let hints = self.load().await.map_err(|e| RepoCacheError::HintResolve {
            message: format!("{}: {e}", self.path.display()),
        })?;
        Ok(lookup(&hints, identifiers))
    }

    async fn save(&self, ctx: &CancellationToken, hints: &HintMap) -> RepoCacheResult<()> {
        if ctx.is_cancelled() {
            return Err(RepoCacheError::Cancelled);
        }
        let _guard = self.write_lock.lock().await;

        let save_err = |e: std::io::Error| RepoCacheError::HintSave {
            message: format!("{}: {e}", self.path.display()),
        };
        let mut merged = self.load().await.map_err(save_err)?;
        overwrite(&mut merged, hints.clone());

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &merged))
            .await
            .map_err(|e| RepoCacheError::HintSave {
                message: format!("writer task failed: {e}"),
            })?
            .map_err(save_err)?;

        tracing::debug!(
            "saved {} hint entries to {}",
            hints.len(),
            self.path.display()
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

fn write_atomic(path: &Path, hints: &HintMap) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    repocache_util::fs::ensure_dir(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, hints)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
