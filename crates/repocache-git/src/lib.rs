//! Repository fetching: the [`Fetcher`] capability consumed by build
//! sessions, a git-CLI implementation, and the snapshot [`BlobStore`] the
//! fetcher may use to avoid network clones across sessions.

pub mod blob;
pub mod fetcher;
pub mod git;
pub mod remote;

pub use blob::{BlobStore, LocalBlobStore};
pub use fetcher::Fetcher;
pub use git::GitFetcher;
