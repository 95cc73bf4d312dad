//! Live entries and tombstones.
//!
//! An [`Entry`] is a value plus an optional absolute expiry instant.
//! When an entry leaves the store it is kept as a [`Tombstone`] recording
//! how it was removed and whether it had already expired.

use crate::storage::value::Value;
use std::time::{Duration, SystemTime};

/// A live stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<SystemTime>,
}

impl Entry {
    /// Creates an entry that expires `ttl` from now, or never if `ttl` is None.
    ///
    /// A TTL reaching past the last instant `SystemTime` can hold also means
    /// the entry never expires.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| SystemTime::now().checked_add(ttl)),
        }
    }

    /// Name of the stored value's type.
    pub fn type_tag(&self) -> &'static str {
        self.value.type_name()
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Checks if this entry had expired at `now`. Expiry is strict: an entry
    /// whose instant equals `now` is still live.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Returns the remaining time to live, or None if the entry never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at.map(|exp| {
            exp.duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}

/// How an entry came to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Removed by the sweeper or by a read that found it expired
    Auto,
    /// Removed by an explicit delete
    Manual,
}

/// A retained record of a removed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    /// The value the entry held when it was removed
    pub value: Value,
    /// True if the sweeper (or an expiry check) removed the entry
    pub auto_cleaned: bool,
    /// True if the entry had passed its expiry instant when removed
    pub was_expired: bool,
    /// When the entry was removed
    pub deleted_at: SystemTime,
}

impl Tombstone {
    /// Records the removal of `entry` at `now`.
    ///
    /// Automatic removals only ever happen to expired entries, so they are
    /// always marked `was_expired`.
    pub fn from_entry(entry: Entry, removal: Removal, now: SystemTime) -> Self {
        let (auto_cleaned, was_expired) = match removal {
            Removal::Auto => (true, true),
            Removal::Manual => (false, entry.is_expired_at(now)),
        };

        Self {
            value: entry.value,
            auto_cleaned,
            was_expired,
            deleted_at: now,
        }
    }

    /// Name of the removed value's type.
    pub fn type_tag(&self) -> &'static str {
        self.value.type_name()
    }
}
