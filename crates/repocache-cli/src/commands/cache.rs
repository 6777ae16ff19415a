//! Cache command implementation.

use miette::Result;
use repocache_core::config::GlobalConfig;

use crate::cli::CacheAction;

pub fn exec(config: &GlobalConfig, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats => repocache_ops::ops_cache::stats(config),
        CacheAction::Clean => repocache_ops::ops_cache::clean(config),
    }
}
