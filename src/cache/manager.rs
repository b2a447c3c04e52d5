//! Cache manager for persisting snapshots to disk
//!
//! Provides a `CacheManager` that stores serializable data as JSON envelopes
//! (`{timestamp, data}`) and only hands the data back while the envelope is
//! younger than the duration configured for its cache kind.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// The named caches the service keeps on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Decoded snapshot plus its normalized company list
    Data,
    /// Company name to ticker lookups
    Ticker,
}

impl CacheKind {
    /// File name of the envelope for this cache
    pub fn file_name(self) -> &'static str {
        match self {
            CacheKind::Data => "data_cache.json",
            CacheKind::Ticker => "ticker_cache.json",
        }
    }
}

/// How long each named cache stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDurations {
    pub data: Duration,
    pub ticker: Duration,
}

impl Default for CacheDurations {
    fn default() -> Self {
        Self {
            data: Duration::days(1),
            // Tickers rarely change
            ticker: Duration::days(365),
        }
    }
}

impl CacheDurations {
    pub fn for_kind(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Data => self.data,
            CacheKind::Ticker => self.ticker,
        }
    }
}

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    /// When the data was cached
    timestamp: DateTime<Utc>,
    /// The cached data
    data: T,
}

/// Manages reading and writing cache envelopes
///
/// Envelopes live as JSON files in an XDG-compliant cache directory
/// (`~/.cache/watermelon-api/` on Linux) unless a directory is given explicitly.
/// Neither `load` nor `save` ever fails: unreadable, corrupt or expired
/// envelopes read as `None`, and write failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    durations: CacheDurations,
}

impl CacheManager {
    /// Creates a new CacheManager using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new(durations: CacheDurations) -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "watermelon-api")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self {
            cache_dir,
            durations,
        })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>, durations: CacheDurations) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            durations,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn durations(&self) -> CacheDurations {
        self.durations
    }

    /// Returns the path to the envelope file for the given cache
    pub fn cache_path(&self, kind: CacheKind) -> PathBuf {
        self.cache_dir.join(kind.file_name())
    }

    /// Reads the named cache
    ///
    /// # Returns
    /// * `Some(T)` if the envelope exists, parses, and is within its duration
    /// * `None` otherwise
    pub fn load<T: DeserializeOwned>(&self, kind: CacheKind) -> Option<T> {
        self.load_at(kind, Utc::now())
    }

    /// Reads the named cache as if the current time were `now`
    pub fn load_at<T: DeserializeOwned>(&self, kind: CacheKind, now: DateTime<Utc>) -> Option<T> {
        let path = self.cache_path(kind);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no cache envelope");
                return None;
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error loading cache");
                return None;
            }
        };

        if now - envelope.timestamp > self.durations.for_kind(kind) {
            info!(cache = ?kind, "cache has expired");
            return None;
        }

        debug!(cache = ?kind, "using cached data");
        Some(envelope.data)
    }

    /// Overwrites the named cache with `data`, stamped with the current time
    ///
    /// Failures are logged, never returned.
    pub fn save<T: Serialize>(&self, kind: CacheKind, data: &T) {
        match self.try_save(kind, data) {
            Ok(()) => debug!(cache = ?kind, "data cached successfully"),
            Err(e) => warn!(cache = ?kind, error = %e, "error saving cache"),
        }
    }

    /// Writes to a temporary file in the cache directory, then renames it over
    /// the envelope, so readers see either the old envelope or the new one.
    fn try_save<T: Serialize>(&self, kind: CacheKind, data: &T) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let envelope = CacheEnvelope {
            timestamp: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&envelope)?;

        let mut file = NamedTempFile::new_in(&self.cache_dir)?;
        file.write_all(json.as_bytes())?;
        file.persist(self.cache_path(kind)).map_err(|e| e.error)?;
        Ok(())
    }
}
