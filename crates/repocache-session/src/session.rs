use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use repocache_core::hints::overwrite;
use repocache_core::{HintMap, WorkTree};
use repocache_flight::{CallError, CallGroup};
use repocache_git::Fetcher;
use repocache_hints::HintStore;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use tokio_util::sync::CancellationToken;

/// One build's view of the repository cache.
///
/// Fetches and prefetches share a single [`CallGroup`], so each URL is fetched
/// at most once and its outcome (including a failure) is reused for the rest
/// of the session. After [`close`](Self::close) every operation returns
/// [`RepoCacheError::SessionClosed`].
pub struct BuildSession {
    id: u64,
    hints: Arc<dyn HintStore>,
    fetcher: Arc<dyn Fetcher>,
    calls: CallGroup<Arc<WorkTree>, RepoCacheError>,
    recorded: Mutex<HintMap>,
    requested: Mutex<HashSet<String>>,
    save_hints: bool,
    closed: AtomicBool,
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("id", &self.id)
            .field("urls", &self.calls.len())
            .field("save_hints", &self.save_hints)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl BuildSession {
    pub(crate) fn new(
        id: u64,
        hints: Arc<dyn HintStore>,
        fetcher: Arc<dyn Fetcher>,
        save_hints: bool,
    ) -> Self {
        Self {
            id,
            hints,
            fetcher,
            calls: CallGroup::new(),
            recorded: Mutex::new(HintMap::new()),
            requested: Mutex::new(HashSet::new()),
            save_hints,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn saves_hints_on_close(&self) -> bool {
        self.save_hints
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve `identifiers` through the hint store and start fetching every
    /// predicted URL in the background.
    ///
    /// Returns once the fetches are scheduled. If the hint store fails, the
    /// error is returned and nothing is scheduled. Background outcomes are
    /// observed only by a later [`fetch`](Self::fetch) of the same URL.
    pub async fn initiate_prefetch(
        &self,
        ctx: &CancellationToken,
        identifiers: &[String],
    ) -> RepoCacheResult<()> {
        self.ensure_open()?;
        let urls = self.hints.resolve(ctx, identifiers).await?;

        let mut started = 0;
        for url in &urls {
            let fetcher = Arc::clone(&self.fetcher);
            if self
                .calls
                .launch(ctx, url, move |ctx, url| async move { fetcher.fetch(&ctx, &url).await })
            {
                started += 1;
            }
        }
        tracing::debug!(
            "session {}: prefetching {started} of {} predicted repositories",
            self.id,
            urls.len()
        );
        Ok(())
    }

    /// Return the working tree for `url`, fetching it only if this session has
    /// not already done so (or is not already doing so).
    pub async fn fetch(
        &self,
        ctx: &CancellationToken,
        url: &str,
    ) -> RepoCacheResult<Arc<WorkTree>> {
        self.ensure_open()?;
        lock(&self.requested).insert(url.to_string());

        let fetcher = Arc::clone(&self.fetcher);
        self.calls
            .call(ctx, url, move |ctx, url| async move { fetcher.fetch(&ctx, &url).await })
            .await
            .map_err(|e| match e {
                CallError::Failed(e) => e,
                CallError::Cancelled => RepoCacheError::Cancelled,
                CallError::Abandoned { key } => RepoCacheError::Abandoned { url: key },
            })
    }

    /// Record identifier associations. An identifier already recorded in this
    /// session has its URL list replaced, not extended.
    pub fn record_hints(&self, hints: HintMap) -> RepoCacheResult<()> {
        self.ensure_open()?;
        overwrite(&mut lock(&self.recorded), hints);
        Ok(())
    }

    /// Hints recorded so far.
    pub fn recorded_hints(&self) -> HintMap {
        lock(&self.recorded).clone()
    }

    /// Every URL fetched or prefetched in this session, sorted.
    pub fn urls(&self) -> Vec<String> {
        self.calls.keys()
    }

    /// Finish the session, saving recorded hints if the session was opened
    /// with saving enabled.
    ///
    /// Must be called once, after all fetch and hint activity has finished.
    pub async fn close(&self, ctx: &CancellationToken) -> RepoCacheResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(RepoCacheError::SessionClosed);
        }
        self.report_unobserved_failures();

        if !self.save_hints {
            tracing::debug!("session {} closed", self.id);
            return Ok(());
        }
        let hints = self.recorded_hints();
        self.hints.save(ctx, &hints).await?;
        tracing::debug!(
            "session {} closed, saved {} hint entries",
            self.id,
            hints.len()
        );
        Ok(())
    }

    fn ensure_open(&self) -> RepoCacheResult<()> {
        if self.is_closed() {
            return Err(RepoCacheError::SessionClosed);
        }
        Ok(())
    }

    /// Prefetches that failed without anyone asking for the URL would
    /// otherwise go unnoticed.
    fn report_unobserved_failures(&self) {
        let requested = lock(&self.requested);
        for url in self.calls.keys() {
            if requested.contains(&url) {
                continue;
            }
            if let Some(Err(e)) = self.calls.outcome(&url) {
                tracing::warn!("session {}: prefetch of {url} failed: {e}", self.id);
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
