use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Completion slot for one key: `None` while the producer runs, then the
/// permanent outcome.
type Slot<T, E> = watch::Receiver<Option<Result<T, E>>>;

/// Why a coalesced call did not yield the producer's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError<E> {
    /// The waiting caller's own token fired. The producer keeps running.
    #[error("call cancelled while waiting")]
    Cancelled,

    /// The producer task ended (panicked or was aborted) without publishing.
    #[error("producer for `{key}` exited without a result")]
    Abandoned { key: String },

    /// The producer's memoized failure.
    #[error(transparent)]
    Failed(E),
}

/// Runs a producer at most once per key and hands its outcome to every caller.
///
/// Records are never removed: once a key completes, its value or error is the
/// answer for the lifetime of the group. Producers are spawned onto the Tokio
/// runtime, so methods that may start one must be called from within a runtime.
pub struct CallGroup<T, E> {
    calls: Mutex<HashMap<String, Slot<T, E>>>,
}

impl<T, E> Default for CallGroup<T, E> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T, E> std::fmt::Debug for CallGroup<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CallGroup")
            .field("keys", &calls.len())
            .finish()
    }
}

impl<T, E> CallGroup<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome for `key`, running `producer` only if no caller has
    /// done so before.
    ///
    /// The producer receives a clone of `ctx`, so the creating caller's token
    /// also governs the producer. A caller whose token fires while waiting gets
    /// [`CallError::Cancelled`] without disturbing the producer or other waiters.
    /// An already-completed key returns immediately, even under a fired token.
    pub async fn call<F, Fut>(
        &self,
        ctx: &CancellationToken,
        key: &str,
        producer: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce(CancellationToken, String) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (slot, _) = self.join_or_start(ctx, key, producer);
        wait(ctx, key, slot).await
    }

    /// Start `producer` for `key` if no record exists yet, without waiting.
    ///
    /// Returns `true` when this call created the record. The outcome stays
    /// addressable: a later [`call`](Self::call) for the key attaches to it.
    pub fn launch<F, Fut>(&self, ctx: &CancellationToken, key: &str, producer: F) -> bool
    where
        F: FnOnce(CancellationToken, String) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.join_or_start(ctx, key, producer).1
    }

    /// The completed outcome for `key`, or `None` if unknown or still running.
    pub fn outcome(&self, key: &str) -> Option<Result<T, E>> {
        let calls = self.lock();
        calls.get(key).and_then(|slot| slot.borrow().clone())
    }

    /// Whether a producer for `key` is still running.
    pub fn is_pending(&self, key: &str) -> bool {
        let calls = self.lock();
        calls
            .get(key)
            .is_some_and(|slot| slot.borrow().is_none() && slot.has_changed().is_ok())
    }

    /// Number of keys ever started.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All keys ever started, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<T, E>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_or_start<F, Fut>(
        &self,
        ctx: &CancellationToken,
        key: &str,
        producer: F,
    ) -> (Slot<T, E>, bool)
    where
        F: FnOnce(CancellationToken, String) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let tx = {
            let mut calls = self.lock();
            if let Some(slot) = calls.get(key) {
                tracing::trace!("joining call for {key}");
                return (slot.clone(), false);
            }
            let (tx, rx) = watch::channel(None);
            calls.insert(key.to_string(), rx);
            tx
        };

        tracing::debug!("starting call for {key}");
        let slot = tx.subscribe();
        let fut = producer(ctx.clone(), key.to_string());
        tokio::spawn(async move {
            let outcome = fut.await;
            tx.send_replace(Some(outcome));
        });
        (slot, true)
    }
}

async fn wait<T, E>(
    ctx: &CancellationToken,
    key: &str,
    mut slot: Slot<T, E>,
) -> Result<T, CallError<E>>
where
    T: Clone,
    E: Clone,
{
    let current = slot.borrow().clone();
    if let Some(done) = current {
        return done.map_err(CallError::Failed);
    }

    let settled = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(CallError::Cancelled),
        settled = async { slot.wait_for(Option::is_some).await.map(|v| (*v).clone()) } => settled,
    };

    match settled {
        Ok(Some(outcome)) => outcome.map_err(CallError::Failed),
        Ok(None) | Err(_) => Err(CallError::Abandoned {
            key: key.to_string(),
        }),
    }
}
