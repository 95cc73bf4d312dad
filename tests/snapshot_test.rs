//! Integration tests for persisting and loading snapshots.

use std::fs;
use std::time::Duration;
use tempokv::snapshot;
use tempokv::{Store, StoreConfig, StoreError, Ttl, Value};

fn store_in(dir: &tempfile::TempDir) -> Store {
    Store::new(StoreConfig::default().with_snapshot_dir(dir.path()))
}

#[test]
fn persist_then_load_into_second_store() {
    let dir = tempfile::tempdir().unwrap();

    let source = store_in(&dir);
    source.set("a", 1i32, Ttl::Never).unwrap();
    source.set("b", 2i32, Ttl::Never).unwrap();
    let seq = source.persist().unwrap();
    assert_eq!(seq, 1);
    assert!(dir.path().join("persisted1").exists());
    assert!(dir.path().join("expired1").exists());

    let target = store_in(&dir);
    assert_eq!(target.load(seq).unwrap(), 2);

    assert!(target.contains_key("a"));
    assert_eq!(target.get("a"), Some(Value::I32(1)));
    assert_eq!(target.get("b"), Some(Value::I32(2)));
    assert!(target.contains_prefix("a"));
    assert_eq!(target.snapshot_sequence(), seq + 1);
}

#[test]
fn load_keeps_live_entries() {
    let dir = tempfile::tempdir().unwrap();

    let source = store_in(&dir);
    source.set("a", 1i32, Ttl::Never).unwrap();
    source.set("b", 2i32, Ttl::Never).unwrap();
    let seq = source.persist().unwrap();

    let target = store_in(&dir);
    target.set("a", 100i32, Ttl::Never).unwrap();

    assert_eq!(target.load(seq).unwrap(), 1);
    assert_eq!(target.get("a"), Some(Value::I32(100)));
    assert_eq!(target.get("b"), Some(Value::I32(2)));
}

#[test]
fn load_replaces_expired_entries() {
    let dir = tempfile::tempdir().unwrap();

    let source = store_in(&dir);
    source.set("a", "persisted", Ttl::Never).unwrap();
    let seq = source.persist().unwrap();

    let target = store_in(&dir);
    target.set("a", "stale", Duration::from_millis(10)).unwrap();
    std::thread::sleep(Duration::from_millis(30));

    assert_eq!(target.load(seq).unwrap(), 1);
    assert_eq!(target.get("a"), Some(Value::from("persisted")));
}

#[test]
fn tombstones_and_expiry_survive_a_snapshot() {
    let dir = tempfile::tempdir().unwrap();

    let store = store_in(&dir);
    store.set("gone", 7u16, Ttl::Never).unwrap();
    store.set("timed", 1.5f32, Duration::from_secs(3600)).unwrap();
    store.delete("gone");
    let seq = store.persist().unwrap();

    let tombstones = snapshot::read_tombstones(dir.path(), seq).unwrap();
    let gone = &tombstones["gone"];
    assert_eq!(gone.value, Value::U16(7));
    assert!(!gone.auto_cleaned);
    assert!(!gone.was_expired);

    let entries = snapshot::read_entries(dir.path(), seq).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries["timed"].expires_at,
        store.get_with_expiration("timed").unwrap().1
    );
}

#[test]
fn sequences_advance_and_latest_is_found() {
    let dir = tempfile::tempdir().unwrap();

    let store = store_in(&dir);
    store.set("k", 1u8, Ttl::Never).unwrap();
    assert_eq!(store.persist().unwrap(), 1);
    store.set("k2", 2u8, Ttl::Never).unwrap();
    assert_eq!(store.persist().unwrap(), 2);

    assert_eq!(snapshot::latest_sequence(dir.path()).unwrap(), Some(2));

    let restored = store_in(&dir);
    assert_eq!(restored.load_latest().unwrap(), Some(2));
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.persist().unwrap(), 3);
}

#[test]
fn load_latest_without_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.load_latest().unwrap(), None);
    assert_eq!(store.snapshot_sequence(), 1);
}

#[test]
fn corrupt_snapshot_merges_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(snapshot::entries_path(dir.path(), 4), b"TMKV\x09E").unwrap();

    let store = store_in(&dir);
    let err = store.load(4).unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));
    assert!(store.is_empty());
    assert_eq!(store.snapshot_sequence(), 1);
}

#[test]
fn flush_persists_then_clears() {
    let dir = tempfile::tempdir().unwrap();

    let store = store_in(&dir);
    store.set("a", 1i64, Ttl::Never).unwrap();
    store.delete("a");
    store.set("b", 2i64, Ttl::Never).unwrap();
    store.flush().unwrap();

    assert!(store.is_empty());
    assert_eq!(store.tombstones().len(), 1);
    // The insertion counter is not reset
    assert_eq!(store.size(), 2);

    let entries = snapshot::read_entries(dir.path(), 1).unwrap();
    assert_eq!(entries["b"].value, Value::I64(2));
}

#[test]
fn flush_keeps_entries_when_persist_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let store = Store::new(StoreConfig::default().with_snapshot_dir(&missing));
    store.set("a", 1i64, Ttl::Never).unwrap();

    let err = store.flush().unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
    assert_eq!(store.get("a"), Some(Value::I64(1)));
}
