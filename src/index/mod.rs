//! Prefix Index
//!
//! Answers "has any key starting with this prefix ever been stored?".
//! The store registers every inserted key here while holding its lock, so
//! the index itself carries no synchronization.
//!
//! Keys are never removed: after a delete, queries for the deleted key's
//! prefixes keep returning true.

pub mod trie;

pub use trie::{InvalidByte, PrefixIndex};
