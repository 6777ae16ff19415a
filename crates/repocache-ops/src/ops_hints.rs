//! Operation: inspect the configured hint store.

use repocache_core::config::GlobalConfig;
use tokio_util::sync::CancellationToken;

/// Print the repositories the hint store predicts for `identifiers`.
pub async fn show(config: &GlobalConfig, identifiers: &[String]) -> miette::Result<()> {
    let store = crate::hint_store(config)?;
    let urls = store
        .resolve(&CancellationToken::new(), identifiers)
        .await?;

    if urls.is_empty() {
        println!("No hints for {}", identifiers.join(", "));
        return Ok(());
    }
    for url in urls {
        println!("{url}");
    }
    Ok(())
}
