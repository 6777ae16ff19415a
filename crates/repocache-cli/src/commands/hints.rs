//! Hints command implementation.

use miette::Result;
use repocache_core::config::GlobalConfig;

use crate::cli::HintsAction;

pub async fn exec(config: &GlobalConfig, action: HintsAction) -> Result<()> {
    match action {
        HintsAction::Show { identifiers } => {
            repocache_ops::ops_hints::show(config, &identifiers).await
        }
    }
}
