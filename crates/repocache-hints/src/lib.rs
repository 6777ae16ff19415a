//! Hint store: a best-effort database of which repositories builds of a given
//! identifier needed in the past, used to prefetch before the dependency graph
//! is known.
//!
//! [`HintStore`] is the capability the session layer consumes; this crate also
//! ships in-memory, JSON-file and HTTP document-store implementations.

pub mod file;
pub mod http;
pub mod memory;
pub mod store;

pub use file::FileHintStore;
pub use http::HttpHintStore;
pub use memory::MemoryHintStore;
pub use store::HintStore;
