//! Storage Module
//!
//! This module provides the core storage functionality for tempokv: the
//! thread-safe [`Store`], the value and entry model it holds, and the
//! background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   entries ──remove──> tombstones        PrefixIndex         │
//! │      │                                  (every key ever     │
//! │      └──────────── RwLock ────────────   inserted)          │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲                    │
//!                            │ sweep()            │ persist() / load()
//!              ┌─────────────┴─────────────┐      ▼
//!              │     ExpirySweeper         │   persisted<N> / expired<N>
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tempokv::storage::{Store, Value};
//! use tempokv::{StoreConfig, Ttl};
//! use std::time::Duration;
//!
//! let store = Store::new(StoreConfig::default());
//!
//! store.set("hits", 0u64, Ttl::Never).unwrap();
//! store.increment("hits", 1u64).unwrap();
//! assert_eq!(store.get("hits"), Some(Value::U64(1)));
//!
//! store.set("token", "abc123", Duration::from_secs(3600)).unwrap();
//! assert!(store.delete("token"));
//! assert!(!store.tombstone("token").unwrap().auto_cleaned);
//! ```

pub mod engine;
pub mod entry;
pub mod expiry;
pub mod value;

// Re-export commonly used types
pub use engine::Store;
pub use entry::{Entry, Removal, Tombstone};
pub use expiry::ExpirySweeper;
pub use value::{ArithmeticError, Value};
