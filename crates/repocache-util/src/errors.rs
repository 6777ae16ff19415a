use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all repocache operations.
///
/// The type is `Clone` so that a single memoized failure can be handed to
/// every caller waiting on the same repository fetch.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum RepoCacheError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Invalid or malformed configuration file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check ~/.repocache/config.toml for syntax errors"))]
    Config { message: String },

    /// The hint store could not be reached while resolving identifiers.
    #[error("Hint store unreachable: {message}")]
    HintResolve { message: String },

    /// The hint store rejected or failed to persist updated associations.
    #[error("Failed to save hints: {message}")]
    HintSave { message: String },

    /// A repository could not be cloned or updated.
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The snapshot blob store failed.
    #[error("Blob store error: {message}")]
    Blob { message: String },

    /// The caller's cancellation token fired before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// The task producing a fetch result exited without publishing one.
    #[error("Fetch of {url} was abandoned before completing")]
    Abandoned { url: String },

    /// The build session was already closed.
    #[error("Build session is closed")]
    #[diagnostic(help("A build session must not be used after `close`"))]
    SessionClosed,

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

impl RepoCacheError {
    /// Whether this error reports cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Build a fetch failure for `url`.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RepoCacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result alias used by the library crates.
pub type RepoCacheResult<T> = Result<T, RepoCacheError>;
