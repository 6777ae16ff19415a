use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use repocache_core::hints::{lookup, overwrite};
use repocache_core::HintMap;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use tokio_util::sync::CancellationToken;

use crate::store::HintStore;

/// Process-local hint store. Associations live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryHintStore {
    hints: RwLock<HintMap>,
}

impl MemoryHintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `hints`.
    pub fn with_hints(hints: HintMap) -> Self {
        Self {
            hints: RwLock::new(hints),
        }
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> HintMap {
        self.hints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HintStore for MemoryHintStore {
    async fn resolve(
        &self,
        ctx: &CancellationToken,
        identifiers: &[String],
    ) -> RepoCacheResult<Vec<String>> {
        if ctx.is_cancelled() {
            return Err(RepoCacheError::Cancelled);
        }
        let hints = self.hints.read().unwrap_or_else(PoisonError::into_inner);
        Ok(lookup(&hints, identifiers))
    }

    async fn save(&self, ctx: &CancellationToken, hints: &HintMap) -> RepoCacheResult<()> {
        if ctx.is_cancelled() {
            return Err(RepoCacheError::Cancelled);
        }
        let mut stored = self.hints.write().unwrap_or_else(PoisonError::into_inner);
        overwrite(&mut stored, hints.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
