//! Build sessions over a shared hint store and fetcher.
//!
//! A [`SessionCache`] lives for the whole process and mints one
//! [`BuildSession`] per build. Within a session every repository URL is
//! fetched at most once, so all consumers observe the same state of it for
//! the session's lifetime.

pub mod cache;
pub mod session;

pub use cache::SessionCache;
pub use session::BuildSession;
