use async_trait::async_trait;
use repocache_core::HintMap;
use repocache_util::errors::RepoCacheResult;
use tokio_util::sync::CancellationToken;

/// Source of identifier-to-repository associations.
///
/// Implementations must be safe for concurrent use by many build sessions.
#[async_trait]
pub trait HintStore: Send + Sync {
    /// Best-effort list of repository URLs associated with `identifiers`.
    ///
    /// The list may be shorter than `identifiers`, contain duplicates, or be
    /// empty when nothing is known. An error means the store itself could not
    /// be reached ([`RepoCacheError::HintResolve`](repocache_util::errors::RepoCacheError::HintResolve)).
    async fn resolve(
        &self,
        ctx: &CancellationToken,
        identifiers: &[String],
    ) -> RepoCacheResult<Vec<String>>;

    /// Persist `hints`, replacing the URL list of every identifier it contains.
    async fn save(&self, ctx: &CancellationToken, hints: &HintMap) -> RepoCacheResult<()>;

    /// Short backend name for logs and status output.
    fn backend_name(&self) -> &'static str;
}
