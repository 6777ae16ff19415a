//! Operation: inspect and clear the working-tree cache and snapshot store.

use repocache_core::config::GlobalConfig;
use repocache_util::fs::dir_size;

use crate::format_size;

/// Print cache statistics.
pub fn stats(config: &GlobalConfig) -> miette::Result<()> {
    let repos = config.cache.dir_path();
    let trees = std::fs::read_dir(&repos)
        .map(|rd| rd.flatten().filter(|e| e.path().is_dir()).count())
        .unwrap_or(0);

    println!("Working trees: {}", repos.display());
    println!("  Repositories: {trees}");
    println!("  Size:         {}", format_size(dir_size(&repos)));

    match crate::blob_store(config)? {
        Some(blobs) => {
            println!();
            println!("Snapshots: {}", blobs.root().display());
            println!("  Entries:      {}", blobs.entry_count());
            println!("  Size:         {}", format_size(blobs.size()));
        }
        None => {
            println!();
            println!("Snapshots: disabled");
        }
    }
    Ok(())
}

/// Remove every working tree and snapshot.
pub fn clean(config: &GlobalConfig) -> miette::Result<()> {
    let repos = config.cache.dir_path();
    if repos.is_dir() {
        let freed = dir_size(&repos);
        std::fs::remove_dir_all(&repos).map_err(repocache_util::errors::RepoCacheError::from)?;
        println!("Cleared working trees ({} freed)", format_size(freed));
    }

    if let Some(blobs) = crate::blob_store(config)? {
        let freed = blobs.clean()?;
        if freed > 0 {
            println!("Cleared snapshots ({} freed)", format_size(freed));
        }
    }
    Ok(())
}
