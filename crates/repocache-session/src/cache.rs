use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use repocache_git::Fetcher;
use repocache_hints::HintStore;

use crate::session::BuildSession;

/// Process-wide factory for build sessions.
///
/// Cheap to clone; all clones share the same collaborators.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<Inner>,
}

struct Inner {
    hints: Arc<dyn HintStore>,
    fetcher: Arc<dyn Fetcher>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("hints", &self.inner.hints.backend_name())
            .field("sessions", &self.inner.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl SessionCache {
    pub fn new(hints: Arc<dyn HintStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                hints,
                fetcher,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Start a fresh build session with its own fetch records and hints.
    ///
    /// With `save_hints_on_close`, the hints recorded during the session are
    /// handed to the hint store once when the session closes.
    pub fn new_build_session(&self, save_hints_on_close: bool) -> BuildSession {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("opening build session {id} (save hints: {save_hints_on_close})");
        BuildSession::new(
            id,
            Arc::clone(&self.inner.hints),
            Arc::clone(&self.inner.fetcher),
            save_hints_on_close,
        )
    }
}
