//! Store Configuration
//!
//! A store is configured once, at construction, with three knobs:
//!
//! - the default time-to-live applied by [`Ttl::Default`]
//! - how often the background sweeper scans for expired entries
//! - the directory snapshot files are written to and loaded from
//!
//! ## Example
//!
//! ```
//! use tempokv::StoreConfig;
//! use std::time::Duration;
//!
//! let config = StoreConfig::default()
//!     .with_default_ttl(Duration::from_secs(300))
//!     .with_sweep_interval(Duration::from_millis(500))
//!     .with_snapshot_dir("/var/lib/myapp");
//!
//! assert_eq!(config.default_ttl, Some(Duration::from_secs(300)));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between background sweeps (1 second)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Time-to-live requested by an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the store's configured default
    #[default]
    Default,
    /// The entry never expires
    Never,
    /// The entry expires this long after it is written
    After(Duration),
}

impl Ttl {
    /// Resolves this TTL against the store default.
    ///
    /// Returns `None` when the entry should never expire.
    pub fn resolve(self, default_ttl: Option<Duration>) -> Option<Duration> {
        match self {
            Ttl::Default => default_ttl.filter(|d| !d.is_zero()),
            Ttl::Never => None,
            Ttl::After(d) if d.is_zero() => None,
            Ttl::After(d) => Some(d),
        }
    }
}

impl From<Duration> for Ttl {
    /// A zero duration means "never expires".
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Ttl::Never
        } else {
            Ttl::After(d)
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(d: Option<Duration>) -> Self {
        d.map(Ttl::from).unwrap_or(Ttl::Never)
    }
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL used by [`Ttl::Default`] (None = never expires)
    pub default_ttl: Option<Duration>,

    /// Interval between background sweeps (default: 1s)
    pub sweep_interval: Duration,

    /// Directory holding `persisted<N>` / `expired<N>` files (default: current directory)
    pub snapshot_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL. A zero duration means entries never expire by default.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Makes entries written with [`Ttl::Default`] live forever.
    pub fn without_default_ttl(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    /// Sets how often the background sweeper runs.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the directory snapshots are written to and loaded from.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }
}
