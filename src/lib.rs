//! # tempokv - An Embeddable Time-Expiring Key-Value Store
//!
//! tempokv is an in-process key-value store for transient values. Each entry
//! carries its own time-to-live (or the store default), expired entries are
//! removed by a background sweeper, and every removal leaves a tombstone
//! behind. The whole store can be snapshotted to disk and merged back in.
//!
//! ## Features
//!
//! - **TTL Support**: Per-key or default expiry, checked lazily on reads and swept in the background
//! - **Tombstones**: Deleted and expired entries are kept with how and when they were removed
//! - **Prefix Lookup**: Ask whether any key with a given prefix was ever stored
//! - **Snapshots**: Numbered `persisted<N>` / `expired<N>` file pairs in a versioned binary format
//! - **Numeric Values**: In-place increment/decrement with fixed-width wrapping arithmetic
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               tempokv                                   │
//! │                                                                         │
//! │   callers ──set/get/delete/...──┐                                       │
//! │                                 ▼                                       │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                         Store (RwLock)                            │  │
//! │  │   entries        tombstones        PrefixIndex      counters      │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │        ▲                                         │                      │
//! │        │ sweep()                                 │ persist() / load()   │
//! │  ┌─────┴───────────────┐              ┌──────────┴──────────┐           │
//! │  │   ExpirySweeper     │              │   Snapshot Codec    │           │
//! │  │ (Background Task)   │              │ persisted<N> files  │           │
//! │  └─────────────────────┘              └─────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tempokv::{Store, StoreConfig, Ttl, Value};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> tempokv::StoreResult<()> {
//!     let config = StoreConfig::default()
//!         .with_default_ttl(Duration::from_secs(300))
//!         .with_sweep_interval(Duration::from_secs(1))
//!         .with_snapshot_dir("/var/lib/myapp");
//!
//!     // Create the store and start its background sweeper
//!     let (store, sweeper) = Store::start(config);
//!
//!     store.set_default("session:42", "token")?;
//!     store.set("counter", 0i64, Ttl::Never)?;
//!     store.increment("counter", 5i64)?;
//!
//!     assert!(store.contains_prefix("session:"));
//!
//!     // Snapshot to disk, then restore into a fresh store later
//!     let seq = store.persist()?;
//!     store.load(seq)?;
//!
//!     sweeper.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: The store, its value and entry model, and the expiry sweeper
//! - [`index`]: The insert-only prefix trie over keys
//! - [`snapshot`]: Snapshot file naming and the binary codec
//! - [`config`]: Store configuration and TTL requests
//! - [`error`]: The store error type
//!
//! ## Concurrency
//!
//! One `RwLock` guards all store state. Pure reads share it; anything that may
//! remove an entry, including a read that finds its key expired, takes it
//! exclusively. Persist encodes each of its two files under a separate lock
//! acquisition, so writers can interleave between them.

pub mod config;
pub mod error;
pub mod index;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{StoreConfig, Ttl};
pub use error::{StoreError, StoreResult};
pub use index::PrefixIndex;
pub use snapshot::codec::{DecodeError, EncodeError};
pub use storage::{Entry, ExpirySweeper, Removal, Store, Tombstone, Value};

/// Version of tempokv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
