//! Directory resolution abstraction for platform-specific paths.
//!
//! The cache root lives under the per-user application cache directory.
//! Resolution goes through the [`BaseDirs`] trait so tests can pin the
//! layout without touching the real home directory.

use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories_next::ProjectDirs;

use crate::cache::manager::CacheError;

/// Application name used for platform directory derivation.
const APP_NAME: &str = "codevet";

/// Subdirectory of the app cache dir holding extracted rulesets.
const RULESET_SUBDIR: &str = "rulesets";

/// Trait for resolving platform base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The per-user application cache directory, when determinable.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// Production resolver backed by the platform conventions.
#[derive(Debug, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

/// Resolve the ruleset cache root: `<app-cache-dir>/rulesets`.
///
/// # Errors
///
/// Returns [`CacheError::CacheRoot`] when the platform cache directory
/// cannot be determined or is not valid UTF-8.
pub fn ruleset_cache_root(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf, CacheError> {
    let base = dirs.cache_dir().ok_or_else(|| CacheError::CacheRoot {
        reason: "could not determine the platform cache directory".to_owned(),
    })?;
    let base = Utf8PathBuf::from_path_buf(base).map_err(|path| CacheError::CacheRoot {
        reason: format!("cache directory is not valid UTF-8: {}", path.display()),
    })?;
    Ok(base.join(RULESET_SUBDIR))
}
