//! Snapshot Files
//!
//! Each call to [`Store::persist`](crate::Store::persist) writes a pair of
//! files into the configured snapshot directory, numbered by the store's
//! snapshot sequence:
//!
//! ```text
//! persisted<N>   live entries   (codec kind 'E')
//! expired<N>     tombstones     (codec kind 'T')
//! ```
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written snapshot. Nothing here ever deletes
//! old snapshot files.

pub mod codec;

use crate::error::{StoreError, StoreResult};
use crate::storage::entry::{Entry, Tombstone};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name prefix for live-entry snapshots
pub const PERSISTED_PREFIX: &str = "persisted";

/// File name prefix for tombstone snapshots
pub const EXPIRED_PREFIX: &str = "expired";

/// Suffix of in-progress snapshot files
const TMP_SUFFIX: &str = ".tmp";

/// Path of the live-entry file for sequence `seq`.
pub fn entries_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("{}{}", PERSISTED_PREFIX, seq))
}

/// Path of the tombstone file for sequence `seq`.
pub fn tombstones_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("{}{}", EXPIRED_PREFIX, seq))
}

/// Writes `data` to `path` via a temporary file and rename.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> StoreResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    let written = fs::write(&tmp, data)
        .map_err(|e| StoreError::io(&tmp, e))
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e)));
    if written.is_err() {
        // The write error is what gets reported.
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn read_file(path: &Path) -> StoreResult<Vec<u8>> {
    fs::read(path).map_err(|e| StoreError::io(path, e))
}

/// Reads and decodes the live-entry file for sequence `seq`.
pub fn read_entries(dir: &Path, seq: u64) -> StoreResult<HashMap<String, Entry>> {
    let data = read_file(&entries_path(dir, seq))?;
    Ok(codec::decode_entries(&data)?)
}

/// Reads and decodes the tombstone file for sequence `seq`.
pub fn read_tombstones(dir: &Path, seq: u64) -> StoreResult<HashMap<String, Tombstone>> {
    let data = read_file(&tombstones_path(dir, seq))?;
    Ok(codec::decode_tombstones(&data)?)
}

/// Returns the highest sequence number with a `persisted<N>` file in `dir`.
///
/// Returns `Ok(None)` if the directory holds no snapshot.
pub fn latest_sequence(dir: &Path) -> StoreResult<Option<u64>> {
    let read_dir = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut latest = None;
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|e| StoreError::io(dir, e))?;
        let name = dir_entry.file_name();
        let Some(seq) = name
            .to_str()
            .and_then(|name| name.strip_prefix(PERSISTED_PREFIX))
            .and_then(|digits| digits.parse::<u64>().ok())
        else {
            continue;
        };
        latest = latest.max(Some(seq));
    }

    Ok(latest)
}
