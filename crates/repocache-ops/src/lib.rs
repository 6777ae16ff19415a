pub mod ops_cache;
pub mod ops_fetch;
pub mod ops_hints;

use std::sync::Arc;

use repocache_core::config::{GlobalConfig, HintBackend};
use repocache_git::{Fetcher, GitFetcher, LocalBlobStore};
use repocache_hints::{FileHintStore, HintStore, HttpHintStore, MemoryHintStore};
use repocache_session::SessionCache;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};

/// Build the hint store selected by `[hints] backend`.
pub fn hint_store(config: &GlobalConfig) -> RepoCacheResult<Arc<dyn HintStore>> {
    let store: Arc<dyn HintStore> = match config.hints.backend {
        HintBackend::File => Arc::new(FileHintStore::new(config.hints.file_path())),
        HintBackend::Http => {
            let url = config
                .hints
                .url
                .as_deref()
                .ok_or_else(|| RepoCacheError::Config {
                    message: "hints.url is required for the http backend".into(),
                })?;
            Arc::new(HttpHintStore::new(url)?)
        }
        HintBackend::Memory => Arc::new(MemoryHintStore::new()),
    };
    tracing::debug!("using {} hint store", store.backend_name());
    Ok(store)
}

/// Snapshot store from `[snapshots]`, or `None` when disabled.
pub fn blob_store(config: &GlobalConfig) -> RepoCacheResult<Option<Arc<LocalBlobStore>>> {
    if !config.snapshots.enabled {
        return Ok(None);
    }
    Ok(Some(Arc::new(LocalBlobStore::new(
        config.snapshots.dir_path(),
        config.snapshots.max_repo_bytes()?,
        config.snapshots.max_total_bytes()?,
    ))))
}

/// Build the git fetcher from `[git]`, `[cache]` and `[snapshots]`.
pub fn fetcher(config: &GlobalConfig) -> RepoCacheResult<Arc<dyn Fetcher>> {
    let mut fetcher = GitFetcher::new(config.git.program.clone(), config.cache.dir_path());
    if let Some(blobs) = blob_store(config)? {
        fetcher = fetcher.with_snapshots(blobs, config.snapshots.max_repo_bytes()?);
    }
    Ok(Arc::new(fetcher))
}

/// Assemble the process-wide session cache from configuration.
pub fn session_cache(config: &GlobalConfig) -> RepoCacheResult<SessionCache> {
    Ok(SessionCache::new(hint_store(config)?, fetcher(config)?))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
