//! Operation: fetch repositories within one build session.

use std::sync::Arc;

use futures_util::future::join_all;
use repocache_core::config::GlobalConfig;
use repocache_core::hints::{associate, dedup_urls};
use repocache_core::WorkTree;
use repocache_session::BuildSession;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use repocache_util::progress::{spinner, status, status_error, status_warn};
use tokio_util::sync::CancellationToken;

/// Outcome of one repository within a fetch run.
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: RepoCacheResult<Arc<WorkTree>>,
}

/// Fetch `urls` in a single build session.
///
/// `seeds` are identifiers whose recorded hints are prefetched first; after the
/// run each seed is associated with the URLs that fetched successfully. Hints
/// are saved on close when both `save` and `[hints] save` allow it.
pub async fn fetch(
    config: &GlobalConfig,
    urls: &[String],
    seeds: &[String],
    save: bool,
) -> miette::Result<()> {
    let cache = crate::session_cache(config)?;
    let session = cache.new_build_session(save && config.hints.save);

    let ctx = CancellationToken::new();
    let interrupt = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.cancel();
            }
        })
    };

    let urls = dedup_urls(urls);
    let sp = spinner(&format!("Fetching {} repositories...", urls.len()));
    let outcomes = run_session(&ctx, &session, &urls, seeds).await;
    sp.finish_and_clear();
    interrupt.abort();

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(tree) => println!(
                "Fetched {} {} {}",
                outcome.url,
                tree.head(),
                tree.path().display()
            ),
            Err(e) => {
                failed += 1;
                status_error("error", &e.to_string());
            }
        }
    }

    status(
        "Finished",
        &format!("{} of {} repositories", outcomes.len() - failed, outcomes.len()),
    );
    if failed > 0 {
        return Err(RepoCacheError::Generic {
            message: format!("{failed} of {} repositories failed to fetch", outcomes.len()),
        }
        .into());
    }
    Ok(())
}

/// Drive one session: prefetch from `seeds`, fetch every URL concurrently,
/// record `seed -> fetched URLs`, and close.
///
/// A hint store failure while prefetching is reported and the fetches go
/// ahead without predictions. A failure to save hints is reported but does
/// not affect the returned outcomes.
pub async fn run_session(
    ctx: &CancellationToken,
    session: &BuildSession,
    urls: &[String],
    seeds: &[String],
) -> Vec<FetchOutcome> {
    if !seeds.is_empty() {
        if let Err(e) = session.initiate_prefetch(ctx, seeds).await {
            status_warn("warning", &format!("prefetch skipped: {e}"));
        }
    }

    let outcomes: Vec<FetchOutcome> = join_all(urls.iter().map(|url| async move {
        FetchOutcome {
            url: url.clone(),
            result: session.fetch(ctx, url).await,
        }
    }))
    .await;

    if !seeds.is_empty() {
        let fetched: Vec<String> = outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.url.clone())
            .collect();
        if let Err(e) = session.record_hints(associate(seeds, &fetched)) {
            tracing::warn!("could not record hints: {e}");
        }
    }

    if let Err(e) = session.close(ctx).await {
        status_warn("warning", &e.to_string());
    }
    outcomes
}
