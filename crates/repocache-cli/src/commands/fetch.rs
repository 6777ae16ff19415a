//! Handler for `repocache fetch`.

use miette::Result;
use repocache_core::config::GlobalConfig;

pub async fn exec(config: &GlobalConfig, urls: &[String], seeds: &[String], save: bool) -> Result<()> {
    repocache_ops::ops_fetch::fetch(config, urls, seeds, save).await
}
