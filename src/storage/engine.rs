//! Thread-Safe Store with Expiry, Tombstones and Prefix Lookup
//!
//! This module implements the core of tempokv: a map of live entries, a side
//! table of tombstones for removed entries, and a prefix index over every key
//! ever inserted. All of it sits behind one `RwLock`.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: Entries, tombstones, the index and both counters change together,
//!    so they share a single `RwLock`. Pure reads take it shared.
//! 2. **Lazy Expiry**: Reads check expiry themselves; a read that finds an expired
//!    entry re-acquires the lock exclusively before tombstoning it.
//! 3. **Active Expiry**: The background sweeper calls [`Store::sweep`] on a timer.
//! 4. **Tombstones are kept forever**: Nothing prunes the tombstone table.
//!
//! ## Lock Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                  RwLock<Inner>                        │  │
//! │  │  entries     HashMap<String, Entry>                   │  │
//! │  │  tombstones  HashMap<String, Tombstone>               │  │
//! │  │  index       PrefixIndex                              │  │
//! │  │  live_count  usize                                    │  │
//! │  │  snapshot_seq u64                                     │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Known Quirks
//!
//! - [`Store::size`] counts insertions, not keys: every `set`/`add` bumps it,
//!   including overwrites of an existing key, and nothing ever lowers it.
//! - [`Store::decrement`] tombstones an expired key it misses on; [`Store::increment`]
//!   leaves it in place for the sweeper.
//! - The prefix index is never pruned, so prefix queries keep matching deleted keys.

use crate::config::{StoreConfig, Ttl};
use crate::error::{StoreError, StoreResult};
use crate::index::{InvalidByte, PrefixIndex};
use crate::snapshot::{self, codec};
use crate::storage::entry::{Entry, Removal, Tombstone};
use crate::storage::expiry::ExpirySweeper;
use crate::storage::value::{ArithmeticError, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// First snapshot sequence number a new store writes.
pub const INITIAL_SNAPSHOT_SEQUENCE: u64 = 1;

/// Everything guarded by the store lock.
#[derive(Debug)]
struct Inner {
    entries: HashMap<String, Entry>,
    tombstones: HashMap<String, Tombstone>,
    index: PrefixIndex,
    live_count: usize,
    snapshot_seq: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tombstones: HashMap::new(),
            index: PrefixIndex::new(),
            live_count: 0,
            snapshot_seq: INITIAL_SNAPSHOT_SEQUENCE,
        }
    }

    /// Inserts through the `set` path: registers the key and bumps the counter.
    fn insert(&mut self, key: String, entry: Entry) -> StoreResult<()> {
        self.index.insert(&key).map_err(|e| invalid_key(&key, e))?;
        self.entries.insert(key, entry);
        self.live_count += 1;
        Ok(())
    }

    /// Moves `key` into the tombstone table. Returns false if it was absent.
    fn remove(&mut self, key: &str, removal: Removal, now: SystemTime) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.tombstones
                    .insert(key.to_string(), Tombstone::from_entry(entry, removal, now));
                true
            }
            None => false,
        }
    }

    /// Returns the live entry for `key`, tombstoning it first if it has expired.
    fn live(&mut self, key: &str, now: SystemTime) -> Option<&Entry> {
        if self.entries.get(key)?.is_expired_at(now) {
            self.remove(key, Removal::Auto, now);
            trace!(key = %key, "Expired entry removed on access");
            return None;
        }
        self.entries.get(key)
    }
}

/// The main store.
///
/// All operations are synchronous and thread-safe. Wrap the store in an
/// `Arc` to share it between threads and with the background sweeper.
///
/// # Example
///
/// ```
/// use tempokv::{Store, StoreConfig, Ttl, Value};
/// use std::time::Duration;
///
/// let store = Store::new(StoreConfig::default());
///
/// store.set("name", "Ariz", Ttl::Never).unwrap();
/// assert_eq!(store.get("name"), Some(Value::from("Ariz")));
///
/// store.set("session", 42u32, Duration::from_secs(60)).unwrap();
/// assert_eq!(store.increment("session", 1u32).unwrap(), Value::U32(43));
///
/// assert!(store.contains_prefix("sess"));
/// ```
#[derive(Debug)]
pub struct Store {
    inner: RwLock<Inner>,

    /// TTL applied by `Ttl::Default` (None = never expires)
    default_ttl: Option<Duration>,

    /// Interval the sweeper started by `Store::start` runs at
    sweep_interval: Duration,

    /// Where snapshot files live
    snapshot_dir: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

fn invalid_key(key: &str, err: InvalidByte) -> StoreError {
    StoreError::InvalidKey {
        key: key.to_string(),
        byte: err.byte,
        position: err.position,
    }
}

fn arithmetic_error(key: &str, err: ArithmeticError) -> StoreError {
    match err {
        ArithmeticError::TypeMismatch { stored, delta } => StoreError::TypeMismatch {
            key: key.to_string(),
            stored,
            delta,
        },
        ArithmeticError::Unsupported(type_tag) => StoreError::Unsupported {
            key: key.to_string(),
            type_tag,
        },
    }
}

impl Store {
    /// Creates a store without a background sweeper.
    ///
    /// Expired entries are still hidden from reads; they are only moved to the
    /// tombstone table lazily, or when [`Store::sweep`] is called.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
            default_ttl: config.default_ttl,
            sweep_interval: config.sweep_interval,
            snapshot_dir: config.snapshot_dir,
        }
    }

    /// Creates a shared store and starts its background sweeper.
    ///
    /// The sweeper stops when [`ExpirySweeper::stop`] is called or the
    /// returned handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(config: StoreConfig) -> (Arc<Self>, ExpirySweeper) {
        let store = Arc::new(Self::new(config));
        let sweeper = ExpirySweeper::start(Arc::clone(&store), store.sweep_interval);
        (store, sweeper)
    }

    // Every critical section leaves `Inner` consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn make_entry(&self, value: Value, ttl: Ttl) -> Entry {
        Entry::new(value, ttl.resolve(self.default_ttl))
    }

    /// Inserts or overwrites `key`.
    ///
    /// Fails only if the key contains bytes outside printable ASCII.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: impl Into<Ttl>,
    ) -> StoreResult<()> {
        let key = key.into();
        let entry = self.make_entry(value.into(), ttl.into());

        let mut inner = self.write();
        inner.insert(key, entry)
    }

    /// Inserts or overwrites `key` with the store's default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: impl Into<Value>) -> StoreResult<()> {
        self.set(key, value, Ttl::Default)
    }

    /// Inserts `key` only if it has no live entry.
    ///
    /// An expired entry under `key` is tombstoned and replaced.
    pub fn add(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: impl Into<Ttl>,
    ) -> StoreResult<()> {
        let key = key.into();
        let entry = self.make_entry(value.into(), ttl.into());

        let mut inner = self.write();
        if inner.live(&key, SystemTime::now()).is_some() {
            return Err(StoreError::AlreadyExists(key));
        }
        inner.insert(key, entry)
    }

    /// Overwrites the value and expiry of a live `key`.
    ///
    /// Does not touch the prefix index or the size counter.
    pub fn replace(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: impl Into<Ttl>,
    ) -> StoreResult<()> {
        let key = key.into();
        let entry = self.make_entry(value.into(), ttl.into());

        let mut inner = self.write();
        if inner.live(&key, SystemTime::now()).is_none() {
            return Err(StoreError::NotFound(key));
        }
        inner.entries.insert(key, entry);
        Ok(())
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is moved to the tombstone table as an automatic removal.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Gets the value for a key together with its expiry instant
    /// (`None` = never expires).
    pub fn get_with_expiration(&self, key: &str) -> Option<(Value, Option<SystemTime>)> {
        self.get_entry(key)
            .map(|entry| (entry.value, entry.expires_at))
    }

    /// Gets the full live entry for a key.
    pub fn get_entry(&self, key: &str) -> Option<Entry> {
        // Fast path: shared lock for present, live keys
        {
            let inner = self.read();
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Key exists but is expired - need the write lock to tombstone it.
        // Another writer may have refreshed it in between, so check again.
        let mut inner = self.write();
        inner.live(key, SystemTime::now()).cloned()
    }

    /// Deletes a key, keeping a manual-removal tombstone.
    ///
    /// Returns `true` if the key was present (expired or not).
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.write();
        let removed = inner.remove(key, Removal::Manual, SystemTime::now());
        if removed {
            trace!(key = %key, "Entry deleted");
        }
        removed
    }

    /// Adds `delta` to the numeric value stored under `key`.
    ///
    /// The delta must be the same numeric type as the stored value. Integer
    /// overflow wraps. Returns the new value.
    pub fn increment(&self, key: &str, delta: impl Into<Value>) -> StoreResult<Value> {
        let delta = delta.into();
        let mut inner = self.write();

        let entry = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => entry,
            _ => return Err(StoreError::NotFound(key.to_string())),
        };

        let updated = entry
            .value
            .add(&delta)
            .map_err(|e| arithmetic_error(key, e))?;
        entry.value = updated.clone();
        Ok(updated)
    }

    /// Subtracts `delta` from the numeric value stored under `key`.
    ///
    /// Same rules as [`Store::increment`], except that an expired entry found
    /// here is tombstoned before `NotFound` is returned.
    pub fn decrement(&self, key: &str, delta: impl Into<Value>) -> StoreResult<Value> {
        let delta = delta.into();
        let mut inner = self.write();

        if inner.live(key, SystemTime::now()).is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let Some(entry) = inner.entries.get_mut(key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };

        let updated = entry
            .value
            .sub(&delta)
            .map_err(|e| arithmetic_error(key, e))?;
        entry.value = updated.clone();
        Ok(updated)
    }

    /// Checks if `key` is present, whether or not it has expired.
    ///
    /// Never triggers cleanup.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().entries.contains_key(key)
    }

    /// Checks if any key starting with `prefix` was ever inserted.
    ///
    /// Deleted and expired keys still count.
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.read().index.has_prefix(prefix)
    }

    /// Returns a copy of every entry that has not expired.
    ///
    /// Expired entries are skipped but not cleaned up.
    pub fn items(&self) -> HashMap<String, Entry> {
        let inner = self.read();
        let now = SystemTime::now();
        inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Returns the insertion counter.
    ///
    /// This counts `set`/`add` calls, including overwrites, and is never
    /// lowered by deletes, sweeps or flushes. Use [`Store::len`] for the
    /// number of keys actually held.
    pub fn size(&self) -> usize {
        self.read().live_count
    }

    /// Returns the number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Returns true if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the tombstone recorded for `key`, if any.
    pub fn tombstone(&self, key: &str) -> Option<Tombstone> {
        self.read().tombstones.get(key).cloned()
    }

    /// Returns a copy of the whole tombstone table.
    pub fn tombstones(&self) -> HashMap<String, Tombstone> {
        self.read().tombstones.clone()
    }

    /// Returns the sequence number the next `persist` will write.
    pub fn snapshot_sequence(&self) -> u64 {
        self.read().snapshot_seq
    }

    /// The directory snapshots are written to and loaded from.
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// The TTL applied by [`Ttl::Default`].
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Moves every expired entry to the tombstone table.
    ///
    /// The whole scan runs under one exclusive lock acquisition. This is what
    /// the background sweeper calls on each tick.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that were tombstoned.
    pub fn sweep(&self) -> usize {
        let mut inner = self.write();
        let now = SystemTime::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key, Removal::Auto, now);
        }

        expired.len()
    }

    /// Writes the `persisted<N>` / `expired<N>` snapshot pair.
    ///
    /// The sequence number is reserved first; each map is then encoded under
    /// its own lock acquisition, so writers may run between the two files.
    ///
    /// # Returns
    ///
    /// Returns the sequence number that was written, or `SequenceExhausted`
    /// without writing anything once the sequence reaches `u64::MAX`.
    pub fn persist(&self) -> StoreResult<u64> {
        let seq = {
            let mut inner = self.write();
            let seq = inner.snapshot_seq;
            inner.snapshot_seq = seq
                .checked_add(1)
                .ok_or(StoreError::SequenceExhausted(seq))?;
            seq
        };

        let entries = {
            let inner = self.read();
            codec::encode_entries(&inner.entries)
        }
        .inspect_err(|e| warn!(sequence = seq, error = %e, "Failed to encode entries"))?;
        snapshot::write_file(&snapshot::entries_path(&self.snapshot_dir, seq), &entries)?;

        let tombstones = {
            let inner = self.read();
            codec::encode_tombstones(&inner.tombstones)
        }
        .inspect_err(|e| warn!(sequence = seq, error = %e, "Failed to encode tombstones"))?;
        snapshot::write_file(
            &snapshot::tombstones_path(&self.snapshot_dir, seq),
            &tombstones,
        )?;

        info!(
            sequence = seq,
            entries_bytes = entries.len(),
            tombstones_bytes = tombstones.len(),
            "Snapshot persisted"
        );
        Ok(seq)
    }

    /// Merges the `persisted<seq>` snapshot into the store.
    ///
    /// A snapshot entry is taken only if its key is absent or expired here;
    /// live entries are never overwritten. On success the next `persist`
    /// writes `seq + 1`. On any failure nothing is merged.
    ///
    /// # Returns
    ///
    /// Returns the number of entries merged.
    pub fn load(&self, seq: u64) -> StoreResult<usize> {
        let next_seq = seq
            .checked_add(1)
            .ok_or(StoreError::SequenceExhausted(seq))?;
        let loaded = snapshot::read_entries(&self.snapshot_dir, seq)
            .inspect_err(|e| warn!(sequence = seq, error = %e, "Failed to read snapshot"))?;

        for key in loaded.keys() {
            PrefixIndex::validate(key).map_err(|e| invalid_key(key, e))?;
        }

        let mut inner = self.write();
        let now = SystemTime::now();
        let mut merged = 0;

        for (key, entry) in loaded {
            let vacant = inner
                .entries
                .get(&key)
                .map_or(true, |current| current.is_expired_at(now));
            if !vacant {
                continue;
            }
            inner.index.insert(&key).map_err(|e| invalid_key(&key, e))?;
            inner.entries.insert(key, entry);
            merged += 1;
        }
        inner.snapshot_seq = next_seq;

        info!(sequence = seq, merged = merged, "Snapshot loaded");
        Ok(merged)
    }

    /// Loads the highest-numbered snapshot in the snapshot directory.
    ///
    /// Returns the sequence loaded, or `None` if there is no snapshot.
    pub fn load_latest(&self) -> StoreResult<Option<u64>> {
        match snapshot::latest_sequence(&self.snapshot_dir)? {
            Some(seq) => {
                self.load(seq)?;
                Ok(Some(seq))
            }
            None => {
                debug!(dir = %self.snapshot_dir.display(), "No snapshot to load");
                Ok(None)
            }
        }
    }

    /// Persists the current state, then discards every live entry.
    ///
    /// Tombstones, the snapshot sequence and the size counter are left as
    /// they are. If persisting fails the entries are kept and the error is
    /// returned.
    pub fn flush(&self) -> StoreResult<()> {
        let seq = self.persist()?;

        let mut inner = self.write();
        let discarded = inner.entries.len();
        inner.entries.clear();

        info!(sequence = seq, discarded = discarded, "Store flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn store() -> Store {
        Store::new(StoreConfig::default())
    }

    fn expired_entry(value: impl Into<Value>) -> Entry {
        Entry {
            value: value.into(),
            expires_at: Some(SystemTime::now() - Duration::from_secs(1)),
        }
    }

    /// Plants an already-expired entry without going through `set`.
    fn plant_expired(store: &Store, key: &str, value: impl Into<Value>) {
        let mut inner = store.write();
        inner.index.insert(key).unwrap();
        inner.entries.insert(key.to_string(), expired_entry(value));
    }

    #[test]
    fn test_set_and_get() {
        let store = store();

        store.set("key", "value", Ttl::Never).unwrap();
        assert_eq!(store.get("key"), Some(Value::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = store();
        assert_eq!(store.get("nonexistent"), None);
        assert!(store.tombstone("nonexistent").is_none());
    }

    #[test]
    fn test_set_overwrites_and_counts() {
        let store = store();

        store.set("key", 1i32, Ttl::Never).unwrap();
        store.set("key", 2i32, Ttl::Never).unwrap();
        store.set("other", 3i32, Ttl::Never).unwrap();

        assert_eq!(store.get("key"), Some(Value::I32(2)));
        assert_eq!(store.len(), 2);
        // The counter tracks insertions, not distinct keys
        assert_eq!(store.size(), 3);
    }

    #[test]
    fn test_set_rejects_invalid_key() {
        let store = store();

        let err = store.set("bad\nkey", 1i32, Ttl::Never).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidKey {
                byte: b'\n',
                position: 3,
                ..
            }
        ));
        assert!(store.is_empty());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_default_ttl() {
        let store = Store::new(StoreConfig::default().with_default_ttl(Duration::from_secs(60)));

        store.set_default("key", 1u8).unwrap();
        let (_, expires_at) = store.get_with_expiration("key").unwrap();
        let expires_at = expires_at.unwrap();
        assert!(expires_at > SystemTime::now() + Duration::from_secs(59));

        store.set("forever", 1u8, Ttl::Never).unwrap();
        assert_eq!(store.get_with_expiration("forever"), Some((Value::U8(1), None)));

        store.set("zero", 1u8, Duration::ZERO).unwrap();
        assert_eq!(store.get_with_expiration("zero"), Some((Value::U8(1), None)));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let store = Store::new(
            StoreConfig::default().with_default_ttl(Duration::from_secs(u64::MAX)),
        );

        store.set("max", 1i32, Duration::MAX).unwrap();
        store.set_default("default", 2i32).unwrap();
        store.add("added", 3i32, Duration::MAX).unwrap();
        store.replace("max", 4i32, Duration::MAX).unwrap();

        assert_eq!(store.get_with_expiration("max"), Some((Value::I32(4), None)));
        assert_eq!(store.get_with_expiration("default"), Some((Value::I32(2), None)));
        assert_eq!(store.get_with_expiration("added"), Some((Value::I32(3), None)));
        assert_eq!(store.sweep(), 0);
    }

    #[test]
    fn test_far_future_expiry_survives_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_snapshot_dir(dir.path());

        let source = Store::new(config.clone());
        // About a thousand years
        source
            .set("a", 1i32, Duration::from_secs(1000 * 365 * 24 * 3600))
            .unwrap();
        let (_, expires_at) = source.get_with_expiration("a").unwrap();
        let seq = source.persist().unwrap();

        let target = Store::new(config);
        target.load(seq).unwrap();
        assert_eq!(
            target.get_with_expiration("a"),
            Some((Value::I32(1), expires_at))
        );
    }

    #[test]
    fn test_expiry() {
        let store = store();

        store.set("key", "value", Duration::from_millis(50)).unwrap();
        assert_eq!(store.get("key"), Some(Value::from("value")));

        thread::sleep(Duration::from_millis(100));

        // Still held until something notices
        assert!(store.contains_key("key"));
        assert_eq!(store.get("key"), None);
        assert!(!store.contains_key("key"));

        let tomb = store.tombstone("key").unwrap();
        assert!(tomb.auto_cleaned);
        assert!(tomb.was_expired);
        assert_eq!(tomb.value, Value::from("value"));
    }

    #[test]
    fn test_get_with_expiration_on_expired() {
        let store = store();
        plant_expired(&store, "key", 5i64);

        assert_eq!(store.get_with_expiration("key"), None);
        assert!(store.tombstone("key").unwrap().auto_cleaned);
    }

    #[test]
    fn test_add() {
        let store = store();

        store.add("key", 1i32, Ttl::Never).unwrap();
        let err = store.add("key", 2i32, Ttl::Never).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(k) if k == "key"));
        assert_eq!(store.get("key"), Some(Value::I32(1)));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_add_over_expired() {
        let store = store();
        plant_expired(&store, "key", 1i32);

        store.add("key", 2i32, Ttl::Never).unwrap();
        assert_eq!(store.get("key"), Some(Value::I32(2)));

        let tomb = store.tombstone("key").unwrap();
        assert_eq!(tomb.value, Value::I32(1));
        assert!(tomb.auto_cleaned);
    }

    #[test]
    fn test_replace() {
        let store = store();

        let err = store.replace("key", 1i32, Ttl::Never).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!store.contains_key("key"));
        assert!(!store.contains_prefix("k"));

        store.set("key", 1i32, Ttl::Never).unwrap();
        store.replace("key", 2i32, Ttl::Never).unwrap();
        store.replace("key", 3i32, Duration::from_secs(30)).unwrap();

        let (value, expires_at) = store.get_with_expiration("key").unwrap();
        assert_eq!(value, Value::I32(3));
        assert!(expires_at.is_some());
        assert_eq!(store.size(), 1);
        assert_eq!(store.read().index.len(), 1);
    }

    #[test]
    fn test_replace_expired() {
        let store = store();
        plant_expired(&store, "key", 1i32);

        assert!(matches!(
            store.replace("key", 2i32, Ttl::Never),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.contains_key("key"));
    }

    #[test]
    fn test_delete() {
        let store = store();

        store.set("key", "value", Ttl::Never).unwrap();
        assert!(store.delete("key"));
        assert_eq!(store.get("key"), None);
        assert!(!store.delete("key")); // Already deleted

        let tomb = store.tombstone("key").unwrap();
        assert!(!tomb.auto_cleaned);
        assert!(!tomb.was_expired);
        assert_eq!(tomb.type_tag(), "string");
    }

    #[test]
    fn test_delete_expired() {
        let store = store();
        plant_expired(&store, "key", 1u16);

        assert!(store.delete("key"));
        let tomb = store.tombstone("key").unwrap();
        assert!(!tomb.auto_cleaned);
        assert!(tomb.was_expired);
    }

    #[test]
    fn test_tombstone_survives_reinsert() {
        let store = store();

        store.set("key", 1i32, Ttl::Never).unwrap();
        store.delete("key");
        store.set("key", 2i32, Ttl::Never).unwrap();

        assert_eq!(store.get("key"), Some(Value::I32(2)));
        assert_eq!(store.tombstone("key").unwrap().value, Value::I32(1));
    }

    #[test]
    fn test_increment() {
        let store = store();

        store.set("counter", 10i64, Ttl::Never).unwrap();
        assert_eq!(store.increment("counter", 5i64).unwrap(), Value::I64(15));
        assert_eq!(store.get("counter"), Some(Value::I64(15)));

        store.set("byte", 250u8, Ttl::Never).unwrap();
        assert_eq!(store.increment("byte", 10u8).unwrap(), Value::U8(4));

        store.set("ratio", 1.5f64, Ttl::Never).unwrap();
        assert_eq!(store.increment("ratio", 0.5f64).unwrap(), Value::F64(2.0));
    }

    #[test]
    fn test_increment_type_mismatch() {
        let store = store();

        store.set("counter", 10i32, Ttl::Never).unwrap();
        let err = store.increment("counter", 1i64).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                stored: "i32",
                delta: "i64",
                ..
            }
        ));
        assert_eq!(store.get("counter"), Some(Value::I32(10)));
    }

    #[test]
    fn test_increment_unsupported() {
        let store = store();

        store.set("text", "hello", Ttl::Never).unwrap();
        assert!(matches!(
            store.increment("text", 1i32),
            Err(StoreError::Unsupported {
                type_tag: "string",
                ..
            })
        ));

        store.set("n", 1i32, Ttl::Never).unwrap();
        assert!(matches!(
            store.increment("n", "x"),
            Err(StoreError::Unsupported {
                type_tag: "string",
                ..
            })
        ));
    }

    #[test]
    fn test_increment_missing_or_expired() {
        let store = store();

        assert!(matches!(
            store.increment("missing", 1i32),
            Err(StoreError::NotFound(_))
        ));

        plant_expired(&store, "stale", 1i32);
        assert!(matches!(
            store.increment("stale", 1i32),
            Err(StoreError::NotFound(_))
        ));
        // Increment leaves the stale entry for the sweeper
        assert!(store.contains_key("stale"));
        assert!(store.tombstone("stale").is_none());
    }

    #[test]
    fn test_decrement() {
        let store = store();

        store.set("counter", 10i16, Ttl::Never).unwrap();
        assert_eq!(store.decrement("counter", 3i16).unwrap(), Value::I16(7));

        store.set("zero", 0u32, Ttl::Never).unwrap();
        assert_eq!(store.decrement("zero", 1u32).unwrap(), Value::U32(u32::MAX));

        assert!(matches!(
            store.decrement("counter", 1u16),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert_eq!(store.get("counter"), Some(Value::I16(7)));
    }

    #[test]
    fn test_decrement_expired_tombstones() {
        let store = store();

        plant_expired(&store, "stale", 1i32);
        assert!(matches!(
            store.decrement("stale", 1i32),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.contains_key("stale"));
        assert!(store.tombstone("stale").unwrap().auto_cleaned);

        assert!(matches!(
            store.decrement("missing", 1i32),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.tombstone("missing").is_none());
    }

    #[test]
    fn test_increment_preserves_expiry() {
        let store = store();

        store.set("counter", 1u64, Duration::from_secs(60)).unwrap();
        let (_, before) = store.get_with_expiration("counter").unwrap();
        store.increment("counter", 1u64).unwrap();
        let (_, after) = store.get_with_expiration("counter").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_prefix() {
        let store = store();

        store.set("APPLE", 1i32, Ttl::Never).unwrap();
        store.set("APRICOT", 2i32, Ttl::Never).unwrap();

        assert!(store.contains_prefix("AP"));
        assert!(store.contains_prefix("APP"));
        assert!(!store.contains_prefix("B"));

        store.delete("APPLE");
        assert!(store.contains_prefix("APP"));
        assert!(store.contains_prefix("APPLE"));
    }

    #[test]
    fn test_items_skips_expired() {
        let store = store();

        store.set("live", 1i32, Ttl::Never).unwrap();
        plant_expired(&store, "stale", 2i32);

        let mut items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items["live"].value, Value::I32(1));

        // The copy is detached from the store
        items.clear();
        assert_eq!(store.len(), 2);
        assert!(store.tombstone("stale").is_none());
    }

    #[test]
    fn test_sweep() {
        let store = store();

        store.set("key1", "value1", Duration::from_millis(10)).unwrap();
        store.set("key2", "value2", Duration::from_millis(10)).unwrap();
        store.set("key3", "value3", Ttl::Never).unwrap(); // No expiry

        thread::sleep(Duration::from_millis(50));

        assert_eq!(store.sweep(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("key3"));

        for key in ["key1", "key2"] {
            let tomb = store.tombstone(key).unwrap();
            assert!(tomb.auto_cleaned);
            assert!(tomb.was_expired);
        }
        assert_eq!(store.sweep(), 0);
    }

    #[test]
    fn test_persist_advances_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::default().with_snapshot_dir(dir.path()));

        assert_eq!(store.snapshot_sequence(), INITIAL_SNAPSHOT_SEQUENCE);
        assert_eq!(store.persist().unwrap(), 1);
        assert_eq!(store.persist().unwrap(), 2);
        assert_eq!(store.snapshot_sequence(), 3);

        assert!(dir.path().join("persisted1").exists());
        assert!(dir.path().join("expired1").exists());
        assert!(dir.path().join("persisted2").exists());
    }

    #[test]
    fn test_persist_to_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Store::new(StoreConfig::default().with_snapshot_dir(dir.path().join("missing")));

        assert!(matches!(store.persist(), Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_load_merges_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_snapshot_dir(dir.path());

        let source = Store::new(config.clone());
        source.set("a", 1i32, Ttl::Never).unwrap();
        source.set("b", 2i32, Ttl::Never).unwrap();
        source.set("c", 3i32, Ttl::Never).unwrap();
        let seq = source.persist().unwrap();

        let target = Store::new(config);
        target.set("a", 100i32, Ttl::Never).unwrap();
        plant_expired(&target, "b", 200i32);

        assert_eq!(target.load(seq).unwrap(), 2);
        assert_eq!(target.get("a"), Some(Value::I32(100)));
        assert_eq!(target.get("b"), Some(Value::I32(2)));
        assert_eq!(target.get("c"), Some(Value::I32(3)));
        assert!(target.contains_prefix("c"));
        assert_eq!(target.snapshot_sequence(), seq + 1);
        assert_eq!(target.size(), 1);
    }

    #[test]
    fn test_load_failure_leaves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::default().with_snapshot_dir(dir.path()));

        assert!(matches!(store.load(4), Err(StoreError::Io { .. })));

        std::fs::write(dir.path().join("persisted5"), b"TMKV\x01E\x00\x00\x00\x09").unwrap();
        assert!(matches!(store.load(5), Err(StoreError::Decode(_))));

        assert!(store.is_empty());
        assert_eq!(store.snapshot_sequence(), INITIAL_SNAPSHOT_SEQUENCE);
    }

    #[test]
    fn test_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_snapshot_dir(dir.path());

        let store = Store::new(config.clone());
        assert_eq!(store.load_latest().unwrap(), None);

        store.set("a", 1i32, Ttl::Never).unwrap();
        store.persist().unwrap();
        store.set("b", 2i32, Ttl::Never).unwrap();
        store.persist().unwrap();

        let restored = Store::new(config);
        assert_eq!(restored.load_latest().unwrap(), Some(2));
        assert_eq!(restored.get("b"), Some(Value::I32(2)));
        assert_eq!(restored.snapshot_sequence(), 3);
    }

    #[test]
    fn test_persist_at_last_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::default().with_snapshot_dir(dir.path()));
        store.write().snapshot_seq = u64::MAX;

        assert!(matches!(
            store.persist(),
            Err(StoreError::SequenceExhausted(u64::MAX))
        ));
        assert_eq!(store.snapshot_sequence(), u64::MAX);
        assert_eq!(snapshot::latest_sequence(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_load_latest_at_last_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), Entry::new(Value::I32(1), None));
        let bytes = codec::encode_entries(&entries).unwrap();
        snapshot::write_file(&snapshot::entries_path(dir.path(), u64::MAX), &bytes).unwrap();

        let store = Store::new(StoreConfig::default().with_snapshot_dir(dir.path()));
        assert!(matches!(
            store.load_latest(),
            Err(StoreError::SequenceExhausted(u64::MAX))
        ));
        assert!(store.is_empty());
        assert!(!store.contains_prefix("a"));
        assert_eq!(store.snapshot_sequence(), INITIAL_SNAPSHOT_SEQUENCE);
    }

    #[test]
    fn test_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::default().with_snapshot_dir(dir.path()));

        store.set("key1", "value1", Ttl::Never).unwrap();
        store.set("key2", "value2", Ttl::Never).unwrap();
        store.delete("key2");

        store.flush().unwrap();

        assert!(store.is_empty());
        assert!(store.tombstone("key2").is_some());
        assert_eq!(store.snapshot_sequence(), 2);
        assert_eq!(store.size(), 2);

        let saved = snapshot::read_entries(dir.path(), 1).unwrap();
        assert_eq!(saved["key1"].value, Value::from("value1"));
    }

    #[test]
    fn test_flush_keeps_entries_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Store::new(StoreConfig::default().with_snapshot_dir(dir.path().join("missing")));

        store.set("key", 1i32, Ttl::Never).unwrap();
        assert!(store.flush().is_err());
        assert_eq!(store.get("key"), Some(Value::I32(1)));
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(store());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(key.clone(), j as u32, Ttl::Never).unwrap();
                    assert_eq!(store.get(&key), Some(Value::U32(j as u32)));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
        assert_eq!(store.size(), 1000);
        assert!(store.contains_prefix("key-9-"));
    }
}
