//! Shared utilities for repocache.
//!
//! This crate provides cross-cutting concerns used by all other repocache
//! crates: the unified error type, filesystem helpers, hashing, async child
//! process spawning, and terminal status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod process;
pub mod progress;

use std::path::{Path, PathBuf};

/// Returns the path to the repocache data directory (`~/.repocache/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".repocache")
}
