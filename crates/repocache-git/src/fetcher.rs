use std::sync::Arc;

use async_trait::async_trait;
use repocache_core::WorkTree;
use repocache_util::errors::RepoCacheResult;
use tokio_util::sync::CancellationToken;

/// Clones or updates a remote repository and returns its working tree.
///
/// Implementations must tolerate concurrent calls for distinct URLs. They need
/// not deduplicate calls for the same URL; build sessions coalesce those.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Clone `url` if it has not been seen, otherwise fetch and update it, and
    /// return the working tree at the remote's current head.
    async fn fetch(&self, ctx: &CancellationToken, url: &str) -> RepoCacheResult<Arc<WorkTree>>;
}
