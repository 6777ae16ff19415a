//! Core data types for repocache.
//!
//! This crate defines the plain types shared by every other crate: the
//! global configuration file, hint maps (identifier to repository URLs),
//! and the working-tree handle returned by a fetch.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
pub mod hints;
pub mod worktree;

pub use hints::HintMap;
pub use worktree::WorkTree;
