use std::path::{Path, PathBuf};

/// Checked-out content of a repository at the remote's head, as produced by a fetch.
///
/// Fetchers hand these out behind an `Arc` so every caller coalesced onto one
/// fetch observes the very same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTree {
    url: String,
    path: PathBuf,
    head: String,
}

impl WorkTree {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>, head: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            head: head.into(),
        }
    }

    /// The remote URL this tree was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Root directory of the checked-out files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full commit id of the checked-out head.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Abbreviated commit id (first 12 characters).
    pub fn short_head(&self) -> &str {
        let end = self
            .head
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.head.len());
        &self.head[..end]
    }

    /// Path of a file relative to the tree root.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }
}
