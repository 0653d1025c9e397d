//! Secure extraction of ruleset archives.
//!
//! Archives arrive from the network, so every entry is treated as hostile:
//! paths are re-rooted under the extraction target (zip-slip defence),
//! per-file content is capped regardless of the declared header size
//! (decompression-bomb defence), and only plain files and directories are
//! materialized. Platform junk entries are dropped by filename convention.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::EntryType;
use thiserror::Error;

/// Maximum bytes copied for a single archive entry.
///
/// Rule files are small text documents; anything past this limit is
/// truncated rather than failing the archive.
pub const MAX_ENTRY_BYTES: u64 = 10 * 1024 * 1024;

/// Magic prefix of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Magic prefix of a zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Permission bits retained when applying archive modes.
#[cfg(unix)]
const MODE_MASK: u32 = 0o755;

/// Errors arising from archive extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The archive does not start with a recognized compression framing.
    #[error("unsupported archive compression framing")]
    UnsupportedCompression,

    /// Reading a header or writing an entry failed.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for unpacking a downloaded archive, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract `bytes` into `dest`, which must already exist.
    ///
    /// Entries that escape `dest` or match junk conventions are skipped;
    /// a malformed header aborts the whole extraction and the caller is
    /// expected to delete the partial output.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnsupportedCompression`] for unknown
    /// framing and [`ExtractionError::Io`] on read or write failures.
    fn extract(&self, bytes: &[u8], dest: &Path) -> Result<(), ExtractionError>;
}

/// Production extractor for gzip- or zstd-framed tar archives.
#[derive(Debug, Default)]
pub struct TarballExtractor;

impl ArchiveExtractor for TarballExtractor {
    fn extract(&self, bytes: &[u8], dest: &Path) -> Result<(), ExtractionError> {
        if bytes.starts_with(&GZIP_MAGIC) {
            unpack_entries(tar::Archive::new(GzDecoder::new(bytes)), dest)
        } else if bytes.starts_with(&ZSTD_MAGIC) {
            let decoder = zstd::Decoder::new(bytes)?;
            unpack_entries(tar::Archive::new(decoder), dest)
        } else {
            Err(ExtractionError::UnsupportedCompression)
        }
    }
}

/// Walk the tar stream and materialize each acceptable entry.
fn unpack_entries<R: Read>(
    mut archive: tar::Archive<R>,
    dest: &Path,
) -> Result<(), ExtractionError> {
    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let stored_path = entry.path()?.into_owned();

        let Some(relative) = sanitize_entry_path(&stored_path) else {
            log::warn!(
                "skipping archive entry escaping the extraction root: {}",
                stored_path.display()
            );
            continue;
        };
        if is_junk_entry(&relative) {
            log::debug!("skipping junk archive entry: {}", relative.display());
            continue;
        }

        let target = dest.join(&relative);
        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                apply_entry_mode(&entry, &target);
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                write_limited(&mut entry, &target, MAX_ENTRY_BYTES)?;
                apply_entry_mode(&entry, &target);
            }
            other => {
                // Links, devices, and fifos are never legitimate rule content.
                log::debug!(
                    "skipping archive entry of type {:?}: {}",
                    other,
                    relative.display()
                );
            }
        }
    }
    Ok(())
}

/// Re-root a stored entry path below the extraction target.
///
/// Returns `None` for absolute paths and for any path containing a parent
/// component; `.` components are dropped.
fn sanitize_entry_path(path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return None;
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Whether a sanitized entry path is platform junk by filename convention.
fn is_junk_entry(path: &Path) -> bool {
    for component in path.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        let name = part.to_string_lossy();
        if name == "__MACOSX" {
            return true;
        }
        if name == ".DS_Store" || name == "Thumbs.db" || name.starts_with("._") {
            return true;
        }
    }
    false
}

/// Copy entry content into `target`, stopping at `limit` bytes.
fn write_limited(reader: &mut dyn Read, target: &Path, limit: u64) -> io::Result<u64> {
    let mut file = fs::File::create(target)?;
    io::copy(&mut reader.take(limit), &mut file)
}

/// Apply the entry's permission bits to the created path, best-effort.
#[cfg(unix)]
fn apply_entry_mode<R: Read>(entry: &tar::Entry<'_, R>, target: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(mode) = entry.header().mode() else {
        return;
    };
    let permissions = fs::Permissions::from_mode((mode & MODE_MASK) | 0o600);
    if let Err(error) = fs::set_permissions(target, permissions) {
        log::debug!(
            "could not apply mode to {}: {error}",
            target.display()
        );
    }
}

#[cfg(not(unix))]
fn apply_entry_mode<R: Read>(_entry: &tar::Entry<'_, R>, _target: &Path) {}
