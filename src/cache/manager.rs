//! Cache manager: the fetch-validate-cache-serve state machine.
//!
//! One manager instance serves one scan run. For each requested ruleset it
//! either serves a valid cached entry, or downloads, verifies, and extracts
//! a fresh one. Replacement is atomic: extraction lands in a sibling
//! temporary directory that is renamed over the final path, so the on-disk
//! cache is always either the previous valid version or absent. When the
//! catalog is unreachable, an expired entry that is not too old may be
//! served as a degraded fallback.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Duration;
use thiserror::Error;

use crate::checksum::{ChecksumError, verify_bytes};
use crate::extract::{ArchiveExtractor, ExtractionError, TarballExtractor};
use crate::identity::{LATEST_VERSION, RulesetIdentity};
use crate::remote::download::{DownloadError, RulesetDownload, RulesetDownloader};
use crate::remote::manifest::MANIFEST_FILE_NAME;
use crate::source::is_rule_file;

use super::metadata::{CacheMetadata, METADATA_FILE_NAME, MetadataError};

/// TTL in seconds for the floating `latest` tag. Freshness matters.
const LATEST_TTL_SECS: i64 = 24 * 60 * 60;
/// TTL in seconds for pinned tags, whose content is assumed immutable.
const PINNED_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Suffix of the temporary sibling directory used during refresh.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Errors arising from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The downloaded archive does not match its declared checksum.
    #[error("checksum verification failed: {0}")]
    Checksum(#[from] ChecksumError),

    /// The catalog request failed.
    #[error("catalog download failed: {0}")]
    Download(#[from] DownloadError),

    /// The downloaded archive could not be extracted.
    #[error("archive extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// A sidecar could not be written during refresh.
    #[error("cache metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// The cache root could not be resolved.
    #[error("cache root unavailable: {reason}")]
    CacheRoot {
        /// Description of why resolution failed.
        reason: String,
    },

    /// A filesystem operation on the cache tree failed.
    #[error("cache I/O error at {path}")]
    Io {
        /// Path the operation touched.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Behavioural switches for the cache manager.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Bypass cache validity checks and always refresh.
    pub no_cache: bool,
    /// Disable the stale-cache fallback entirely.
    pub strict: bool,
    /// Oldest entry age servable as a degraded fallback.
    pub max_stale_age: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            no_cache: false,
            strict: false,
            max_stale_age: Duration::days(30),
        }
    }
}

/// The TTL policy for a version tag.
///
/// `latest` floats, so it expires quickly; pinned tags are assumed
/// immutable and refreshing them is hygiene rather than correctness.
#[must_use]
pub fn ttl_for_version(version: &str) -> Duration {
    if version == LATEST_VERSION {
        Duration::seconds(LATEST_TTL_SECS)
    } else {
        Duration::seconds(PINNED_TTL_SECS)
    }
}

/// Orchestrates the cache lifecycle for ruleset archives.
///
/// Not internally synchronized: construct one instance per scan run and do
/// not share it across threads for the same identity. Concurrent refreshes
/// from separate processes are safe (rename is atomic) but wasteful.
pub struct CacheManager {
    root: Utf8PathBuf,
    downloader: Box<dyn RulesetDownloader>,
    extractor: Box<dyn ArchiveExtractor>,
    options: CacheOptions,
}

impl CacheManager {
    /// Build a manager over `root` using the production extractor.
    #[must_use]
    pub fn new(
        root: Utf8PathBuf,
        downloader: Box<dyn RulesetDownloader>,
        options: CacheOptions,
    ) -> Self {
        Self::with_extractor(root, downloader, Box::new(TarballExtractor), options)
    }

    /// Build a manager with an injected extractor. Used by tests to
    /// simulate extraction failures.
    #[must_use]
    pub fn with_extractor(
        root: Utf8PathBuf,
        downloader: Box<dyn RulesetDownloader>,
        extractor: Box<dyn ArchiveExtractor>,
        options: CacheOptions,
    ) -> Self {
        Self {
            root,
            downloader,
            extractor,
            options,
        }
    }

    /// The cache root this manager serves from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The on-disk directory for one ruleset identity.
    #[must_use]
    pub fn entry_dir(&self, identity: &RulesetIdentity) -> Utf8PathBuf {
        self.root.join(identity.name()).join(identity.version())
    }

    /// Return a local directory containing the ruleset's files, serving
    /// the cache when valid and refreshing from the catalog otherwise.
    ///
    /// # Errors
    ///
    /// Returns the refresh error when the download, verification, or
    /// extraction fails and no stale entry qualifies as a fallback.
    pub fn ruleset_path(&self, identity: &RulesetIdentity) -> Result<Utf8PathBuf, CacheError> {
        let entry_dir = self.entry_dir(identity);

        if !self.options.no_cache {
            if let Some(path) = self.try_valid_cache(identity, &entry_dir) {
                return Ok(path);
            }
        }

        match self.refresh(identity, &entry_dir) {
            Ok(path) => Ok(path),
            Err(error) => self.stale_fallback(identity, &entry_dir, error),
        }
    }

    /// Serve the cached entry when it passes every validity check:
    /// directory present, metadata loadable, TTL not elapsed, and at least
    /// one rule file on disk.
    fn try_valid_cache(
        &self,
        identity: &RulesetIdentity,
        entry_dir: &Utf8Path,
    ) -> Option<Utf8PathBuf> {
        if !entry_dir.is_dir() {
            return None;
        }
        let metadata_path = entry_dir.join(METADATA_FILE_NAME);
        let mut metadata = match CacheMetadata::load(metadata_path.as_std_path()) {
            Ok(metadata) => metadata,
            Err(error) => {
                log::debug!("cache miss for {identity}: {error}");
                return None;
            }
        };
        if metadata.is_expired() {
            log::debug!("cache entry for {identity} expired after {}s", metadata.ttl_seconds);
            return None;
        }
        if !contains_rule_files(entry_dir) {
            log::warn!("cache entry for {identity} contains no rule files; refreshing");
            return None;
        }

        metadata.touch();
        if let Err(error) = metadata.save(metadata_path.as_std_path()) {
            log::warn!("could not record cache access for {identity}: {error}");
        }
        log::debug!("serving {identity} from cache at {entry_dir}");
        Some(entry_dir.to_owned())
    }

    /// Download, verify, extract into a temp sibling, then atomically
    /// rename into place.
    fn refresh(
        &self,
        identity: &RulesetIdentity,
        entry_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, CacheError> {
        log::debug!("refreshing {identity} from the catalog");
        let download = self.downloader.download(identity)?;
        verify_bytes(&download.archive, &download.manifest.checksum)?;

        let temp_dir = Utf8PathBuf::from(format!("{entry_dir}{TEMP_SUFFIX}"));
        if let Err(error) = self.populate_temp(identity, &download, &temp_dir) {
            // Never leave a partial temp tree behind.
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(error);
        }
        if let Err(error) = promote(&temp_dir, entry_dir) {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(error);
        }
        log::debug!("cached {identity} at {entry_dir}");
        Ok(entry_dir.to_owned())
    }

    /// Extract the archive and write both sidecars into the temp directory.
    fn populate_temp(
        &self,
        identity: &RulesetIdentity,
        download: &RulesetDownload,
        temp_dir: &Utf8Path,
    ) -> Result<(), CacheError> {
        if temp_dir.exists() {
            // Leftover from a crashed refresh.
            fs::remove_dir_all(temp_dir).map_err(|source| CacheError::Io {
                path: temp_dir.to_owned(),
                source,
            })?;
        }
        fs::create_dir_all(temp_dir).map_err(|source| CacheError::Io {
            path: temp_dir.to_owned(),
            source,
        })?;

        self.extractor
            .extract(&download.archive, temp_dir.as_std_path())?;

        let metadata = CacheMetadata::new(
            identity,
            download.manifest.checksum.clone(),
            ttl_for_version(identity.version()),
        );
        metadata.save(temp_dir.join(METADATA_FILE_NAME).as_std_path())?;

        let manifest_path = temp_dir.join(MANIFEST_FILE_NAME);
        download
            .manifest
            .save(manifest_path.as_std_path())
            .map_err(|source| CacheError::Io {
                path: manifest_path,
                source,
            })?;
        Ok(())
    }

    /// After a failed refresh, serve an expired entry when permitted:
    /// never in strict mode, and never past `max_stale_age`.
    fn stale_fallback(
        &self,
        identity: &RulesetIdentity,
        entry_dir: &Utf8Path,
        error: CacheError,
    ) -> Result<Utf8PathBuf, CacheError> {
        if self.options.strict {
            return Err(error);
        }
        let metadata_path = entry_dir.join(METADATA_FILE_NAME);
        let Ok(mut metadata) = CacheMetadata::load(metadata_path.as_std_path()) else {
            return Err(error);
        };
        if metadata.is_too_stale(self.options.max_stale_age) {
            log::debug!(
                "stale entry for {identity} exceeds the fallback ceiling; propagating failure"
            );
            return Err(error);
        }
        if !contains_rule_files(entry_dir) {
            return Err(error);
        }

        metadata.touch();
        if let Err(save_error) = metadata.save(metadata_path.as_std_path()) {
            log::warn!("could not record cache access for {identity}: {save_error}");
        }
        log::warn!("catalog unreachable for {identity}; serving stale cache: {error}");
        Ok(entry_dir.to_owned())
    }

    /// Remove one cached entry, including any leftover temp sibling.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when removal fails for a reason other
    /// than the entry being absent.
    pub fn evict(&self, identity: &RulesetIdentity) -> Result<(), CacheError> {
        let entry_dir = self.entry_dir(identity);
        let temp_dir = Utf8PathBuf::from(format!("{entry_dir}{TEMP_SUFFIX}"));
        let _ = fs::remove_dir_all(&temp_dir);
        remove_dir_if_present(&entry_dir)?;
        // Drop the now-empty name directory; failure just means it was not
        // empty.
        if let Some(parent) = entry_dir.parent() {
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    /// Remove the entire cache root.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when removal fails.
    pub fn clear(&self) -> Result<(), CacheError> {
        remove_dir_if_present(&self.root)
    }
}

/// Make the temp directory visible at the final path. This rename is the
/// sole point where a refresh becomes observable.
fn promote(temp_dir: &Utf8Path, entry_dir: &Utf8Path) -> Result<(), CacheError> {
    if let Some(parent) = entry_dir.parent() {
        fs::create_dir_all(parent).map_err(|source| CacheError::Io {
            path: parent.to_owned(),
            source,
        })?;
    }
    if entry_dir.exists() {
        fs::remove_dir_all(entry_dir).map_err(|source| CacheError::Io {
            path: entry_dir.to_owned(),
            source,
        })?;
    }
    fs::rename(temp_dir, entry_dir).map_err(|source| CacheError::Io {
        path: entry_dir.to_owned(),
        source,
    })
}

/// Remove a directory tree, treating absence as success.
fn remove_dir_if_present(dir: &Utf8Path) -> Result<(), CacheError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CacheError::Io {
            path: dir.to_owned(),
            source,
        }),
    }
}

/// Whether a directory tree contains at least one rule file.
///
/// Guards against serving partial or tampered entries that lost their
/// content but kept a plausible sidecar.
fn contains_rule_files(dir: &Utf8Path) -> bool {
    let Ok(entries) = dir.read_dir_utf8() else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if contains_rule_files(&path) {
                return true;
            }
        } else if is_rule_file(&path) {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
