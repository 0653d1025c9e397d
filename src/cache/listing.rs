//! Enumeration of cached ruleset entries.
//!
//! Used by the host CLI's cache-inspection surface. Entries whose
//! metadata sidecar is missing or corrupt are still reported so they can
//! be evicted, just without freshness information.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::identity::RulesetIdentity;

use super::manager::TEMP_SUFFIX;
use super::metadata::{CacheMetadata, METADATA_FILE_NAME};

/// One entry found under the cache root.
#[derive(Debug, Clone)]
pub struct CachedRuleset {
    /// The identity derived from the entry's path segments.
    pub identity: RulesetIdentity,
    /// Absolute path of the entry directory.
    pub path: Utf8PathBuf,
    /// The metadata sidecar, when present and readable.
    pub metadata: Option<CacheMetadata>,
}

/// Scan the cache root for entries, sorted by name then version.
///
/// Directories that do not fit the `<name>/<version>` layout (including
/// leftover `.tmp` siblings) are skipped.
///
/// # Errors
///
/// Returns an error when a directory cannot be read; an absent root
/// yields an empty list.
pub fn list_cached(root: &Utf8Path) -> io::Result<Vec<CachedRuleset>> {
    let mut entries = Vec::new();
    if !root.is_dir() {
        return Ok(entries);
    }

    for name_entry in root.read_dir_utf8()? {
        let name_entry = name_entry?;
        if !name_entry.path().is_dir() {
            continue;
        }
        for version_entry in name_entry.path().read_dir_utf8()? {
            let version_entry = version_entry?;
            let path = version_entry.path().to_owned();
            if !path.is_dir() || version_entry.file_name().ends_with(TEMP_SUFFIX) {
                continue;
            }
            let Ok(identity) =
                RulesetIdentity::new(name_entry.file_name(), version_entry.file_name())
            else {
                continue;
            };
            let metadata = CacheMetadata::load(path.join(METADATA_FILE_NAME).as_std_path()).ok();
            entries.push(CachedRuleset {
                identity,
                path,
                metadata,
            });
        }
    }

    entries.sort_by(|a, b| {
        (a.identity.name(), a.identity.version()).cmp(&(b.identity.name(), b.identity.version()))
    });
    Ok(entries)
}
