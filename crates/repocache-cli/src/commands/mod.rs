//! Command dispatch and handler modules.

mod cache;
mod fetch;
mod hints;

use miette::Result;
use repocache_core::config::GlobalConfig;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = GlobalConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Fetch {
            urls,
            seeds,
            no_save,
        } => fetch::exec(&config, &urls, &seeds, !no_save).await,
        Command::Hints { action } => hints::exec(&config, action).await,
        Command::Cache { action } => cache::exec(&config, action),
    }
}
