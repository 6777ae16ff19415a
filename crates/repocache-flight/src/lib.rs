//! Call coalescing ("single flight") keyed by string.
//!
//! A [`CallGroup`] runs a producer at most once per key for its entire
//! lifetime. Concurrent callers for a key wait on the one in-flight producer;
//! later callers receive the memoized outcome. Failures are memoized exactly
//! like successes and are never retried by the group.

pub mod group;

pub use group::{CallError, CallGroup};
