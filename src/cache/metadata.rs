//! Cache entry metadata sidecars.
//!
//! Every cache entry carries a `.cache-meta.json` record describing when
//! it was downloaded, when it was last served, the archive checksum, and
//! the entry's time-to-live. The sidecar is rewritten on every cache hit
//! (last access) and every refresh (download time and checksum).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::Digest;
use crate::identity::RulesetIdentity;

/// Filename of the metadata sidecar inside a cache entry.
pub const METADATA_FILE_NAME: &str = ".cache-meta.json";

/// Owner-only permission bits applied to the sidecar.
#[cfg(unix)]
const METADATA_FILE_MODE: u32 = 0o600;

/// Errors arising from metadata persistence.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No sidecar exists at the expected path.
    #[error("metadata sidecar not found at {}", path.display())]
    NotFound {
        /// Path where the sidecar was expected.
        path: PathBuf,
    },

    /// The sidecar exists but cannot be parsed or violates invariants.
    #[error("metadata sidecar at {} is corrupt: {reason}", path.display())]
    Parse {
        /// Path of the corrupt sidecar.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// Reading or writing the sidecar failed.
    #[error("metadata I/O error at {}", path.display())]
    Io {
        /// Path of the sidecar being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Persistent record describing one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Name of the cached ruleset.
    pub ruleset_name: String,
    /// Version tag of the cached ruleset.
    pub version: String,
    /// When the entry was downloaded and written.
    pub downloaded_at: DateTime<Utc>,
    /// When the entry was last served to a scan.
    pub last_accessed: DateTime<Utc>,
    /// Digest of the archive this entry was extracted from.
    pub checksum: Digest,
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
}

impl CacheMetadata {
    /// Build a fresh record for a just-downloaded entry.
    ///
    /// `downloaded_at` and `last_accessed` both start at the current time,
    /// establishing the `downloaded_at <= last_accessed` invariant.
    #[must_use]
    pub fn new(identity: &RulesetIdentity, checksum: Digest, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            ruleset_name: identity.name().to_owned(),
            version: identity.version().to_owned(),
            downloaded_at: now,
            last_accessed: now,
            checksum,
            ttl_seconds: ttl.num_seconds().max(0).unsigned_abs(),
        }
    }

    /// Load a sidecar from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when the file is absent,
    /// [`MetadataError::Parse`] when it is malformed or violates the
    /// access-time invariant, and [`MetadataError::Io`] otherwise.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                MetadataError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                MetadataError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let metadata: Self =
            serde_json::from_str(&raw).map_err(|e| MetadataError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if metadata.last_accessed < metadata.downloaded_at {
            return Err(MetadataError::Parse {
                path: path.to_path_buf(),
                reason: "last_accessed predates downloaded_at".to_owned(),
            });
        }
        Ok(metadata)
    }

    /// Persist the sidecar at `path` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] when the write or the permission
    /// change fails.
    pub fn save(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| MetadataError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?;
        let io_error = |source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(path, json).map_err(io_error)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(METADATA_FILE_MODE))
                .map_err(io_error)?;
        }
        Ok(())
    }

    /// The entry's time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX))
    }

    /// Elapsed time since the entry was downloaded.
    #[must_use]
    pub fn age(&self) -> Duration {
        Utc::now() - self.downloaded_at
    }

    /// Whether the entry has outlived its TTL.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl()
    }

    /// Whether the entry is older than `max_age` and thus unservable even
    /// as a degraded fallback.
    #[must_use]
    pub fn is_too_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    /// Record that the entry was just served. The caller re-persists.
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> RulesetIdentity {
        RulesetIdentity::new("dca", "latest").expect("valid identity")
    }

    fn fresh_metadata() -> CacheMetadata {
        CacheMetadata::new(&identity(), Digest::of_bytes(b"archive"), Duration::hours(24))
    }

    #[test]
    fn new_starts_with_equal_timestamps() {
        let metadata = fresh_metadata();
        assert_eq!(metadata.downloaded_at, metadata.last_accessed);
        assert_eq!(metadata.ttl_seconds, 24 * 60 * 60);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join(METADATA_FILE_NAME);

        let metadata = fresh_metadata();
        metadata.save(&path).expect("save succeeds");
        let loaded = CacheMetadata::load(&path).expect("load succeeds");
        assert_eq!(loaded, metadata);
    }

    #[cfg(unix)]
    #[test]
    fn save_applies_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join(METADATA_FILE_NAME);

        fresh_metadata().save(&path).expect("save succeeds");
        let mode = fs::metadata(&path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, METADATA_FILE_MODE);
    }

    #[test]
    fn load_missing_sidecar_is_not_found() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = CacheMetadata::load(&temp.path().join(METADATA_FILE_NAME))
            .expect_err("expected error");
        assert!(matches!(err, MetadataError::NotFound { .. }));
    }

    #[test]
    fn load_garbage_sidecar_is_parse_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join(METADATA_FILE_NAME);
        fs::write(&path, "{not json").expect("write garbage");

        let err = CacheMetadata::load(&path).expect_err("expected error");
        assert!(matches!(err, MetadataError::Parse { .. }));
    }

    #[test]
    fn load_rejects_inverted_timestamps() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join(METADATA_FILE_NAME);

        let mut metadata = fresh_metadata();
        metadata.last_accessed = metadata.downloaded_at - Duration::hours(1);
        metadata.save(&path).expect("save succeeds");

        let err = CacheMetadata::load(&path).expect_err("expected error");
        assert!(matches!(err, MetadataError::Parse { .. }));
    }

    #[test]
    fn expiry_boundary_is_ttl_elapsed() {
        let mut metadata = fresh_metadata();

        metadata.downloaded_at = Utc::now() - Duration::hours(24) - Duration::seconds(1);
        assert!(metadata.is_expired());

        metadata.downloaded_at = Utc::now() - Duration::hours(24) + Duration::seconds(1);
        assert!(!metadata.is_expired());
    }

    #[test]
    fn staleness_is_relative_to_max_age() {
        let mut metadata = fresh_metadata();
        metadata.downloaded_at = Utc::now() - Duration::days(5);
        assert!(!metadata.is_too_stale(Duration::days(30)));

        metadata.downloaded_at = Utc::now() - Duration::days(40);
        assert!(metadata.is_too_stale(Duration::days(30)));
    }

    #[test]
    fn touch_advances_last_accessed_only() {
        let mut metadata = fresh_metadata();
        metadata.downloaded_at = Utc::now() - Duration::hours(1);
        metadata.last_accessed = metadata.downloaded_at;

        metadata.touch();
        assert!(metadata.last_accessed > metadata.downloaded_at);
    }
}
