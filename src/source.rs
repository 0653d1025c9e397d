//! Rule source variants and multi-source aggregation.
//!
//! A scan consumes an ordered list of rule paths assembled from local
//! files, local directories, and cache-backed remote rulesets. Exactly
//! three source shapes exist, so they are modelled as a closed sum type:
//! exhaustive handling matters more here than extensibility.

use std::collections::HashSet;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::cache::manager::{CacheError, CacheManager};
use crate::identity::RulesetIdentity;

/// File extensions accepted as rule files.
pub const RULE_FILE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Whether a path carries an accepted rule file extension.
#[must_use]
pub fn is_rule_file(path: &Utf8Path) -> bool {
    path.extension().is_some_and(|ext| {
        RULE_FILE_EXTENSIONS
            .iter()
            .any(|accepted| ext.eq_ignore_ascii_case(accepted))
    })
}

/// Errors arising from rule source resolution.
#[derive(Debug, Error)]
pub enum SourceError {
    /// An aggregation was asked to load with no sources configured.
    #[error("no rule sources configured")]
    NoSources,

    /// A rule directory yielded zero rule files.
    #[error("no rule files found under {dir}")]
    NoRulesFound {
        /// The directory that was walked.
        dir: Utf8PathBuf,
    },

    /// An explicitly listed rule file does not exist.
    #[error("rule file not found: {path}")]
    RuleFileMissing {
        /// The missing path.
        path: Utf8PathBuf,
    },

    /// An explicitly listed rule path is not a regular file.
    #[error("rule path is not a regular file: {path}")]
    NotAFile {
        /// The offending path.
        path: Utf8PathBuf,
    },

    /// An explicitly listed rule file has an unaccepted extension.
    #[error("unsupported rule file extension: {path} (expected .yaml or .yml)")]
    UnsupportedExtension {
        /// The offending path.
        path: Utf8PathBuf,
    },

    /// A rule directory could not be read.
    #[error("failed to read rule directory {dir}")]
    DirRead {
        /// The directory being walked.
        dir: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The cache manager could not produce a remote ruleset directory.
    #[error("could not resolve remote ruleset: {0}")]
    Cache(#[from] CacheError),
}

/// Explicit local rule files and directories.
#[derive(Debug, Clone, Default)]
pub struct LocalRuleSource {
    /// Individual rule files, validated strictly.
    pub files: Vec<Utf8PathBuf>,
    /// Directories walked recursively for rule files.
    pub dirs: Vec<Utf8PathBuf>,
}

/// A catalog ruleset resolved through the cache manager.
#[derive(Debug, Clone)]
pub struct RemoteRuleSource {
    /// The ruleset to resolve.
    pub identity: RulesetIdentity,
}

/// The closed set of rule source shapes.
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// Local files and directories.
    Local(LocalRuleSource),
    /// A cache-backed remote ruleset.
    Remote(RemoteRuleSource),
    /// An ordered aggregation of other sources.
    Multi(Vec<RuleSource>),
}

impl RuleSource {
    /// Build a local source from files and directories.
    #[must_use]
    pub fn local(files: Vec<Utf8PathBuf>, dirs: Vec<Utf8PathBuf>) -> Self {
        Self::Local(LocalRuleSource { files, dirs })
    }

    /// Build a remote source for one ruleset identity.
    #[must_use]
    pub fn remote(identity: RulesetIdentity) -> Self {
        Self::Remote(RemoteRuleSource { identity })
    }

    /// Build an aggregation over `sources`, loaded in order.
    #[must_use]
    pub fn multi(sources: Vec<RuleSource>) -> Self {
        Self::Multi(sources)
    }

    /// Resolve this source into an ordered list of rule paths.
    ///
    /// Remote sources delegate to `cache`; local sources never touch it.
    /// For aggregations the first failing child aborts the whole load.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] describing the first invalid path, empty
    /// directory, or cache failure encountered.
    pub fn load(&self, cache: &CacheManager) -> Result<Vec<Utf8PathBuf>, SourceError> {
        match self {
            Self::Local(local) => local.load(),
            Self::Remote(remote) => remote.load(cache),
            Self::Multi(sources) => load_aggregated(sources, cache),
        }
    }

    /// A provenance string for logging. Never used for logic.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Local(local) => format!(
                "local({} files, {} dirs)",
                local.files.len(),
                local.dirs.len()
            ),
            Self::Remote(remote) => format!("remote({})", remote.identity),
            Self::Multi(sources) => {
                let parts: Vec<String> = sources.iter().map(RuleSource::name).collect();
                format!("multi[{}]", parts.join(", "))
            }
        }
    }
}

impl LocalRuleSource {
    /// Validate explicit files, then walk directories recursively.
    fn load(&self) -> Result<Vec<Utf8PathBuf>, SourceError> {
        let mut paths = Vec::new();
        for file in &self.files {
            if !file.exists() {
                return Err(SourceError::RuleFileMissing { path: file.clone() });
            }
            if !file.is_file() {
                return Err(SourceError::NotAFile { path: file.clone() });
            }
            if !is_rule_file(file) {
                return Err(SourceError::UnsupportedExtension { path: file.clone() });
            }
            paths.push(file.clone());
        }
        for dir in &self.dirs {
            let mut found = Vec::new();
            collect_rule_files(dir, &mut found)?;
            if found.is_empty() {
                return Err(SourceError::NoRulesFound { dir: dir.clone() });
            }
            paths.append(&mut found);
        }
        Ok(paths)
    }
}

impl RemoteRuleSource {
    /// The cache directory is treated opaquely as "a directory of rules".
    fn load(&self, cache: &CacheManager) -> Result<Vec<Utf8PathBuf>, SourceError> {
        let path = cache.ruleset_path(&self.identity)?;
        Ok(vec![path])
    }
}

/// Load every child in order, concatenating and deduplicating by exact
/// path equality while preserving first-seen order.
fn load_aggregated(
    sources: &[RuleSource],
    cache: &CacheManager,
) -> Result<Vec<Utf8PathBuf>, SourceError> {
    if sources.is_empty() {
        return Err(SourceError::NoSources);
    }
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for source in sources {
        log::debug!("loading rule source {}", source.name());
        for path in source.load(cache)? {
            if seen.insert(path.clone()) {
                ordered.push(path);
            }
        }
    }
    Ok(ordered)
}

/// Recursively collect rule files under `dir` in deterministic order.
fn collect_rule_files(dir: &Utf8Path, out: &mut Vec<Utf8PathBuf>) -> Result<(), SourceError> {
    let dir_error = |source| SourceError::DirRead {
        dir: dir.to_owned(),
        source,
    };
    let mut entries = Vec::new();
    for entry in dir.read_dir_utf8().map_err(dir_error)? {
        entries.push(entry.map_err(dir_error)?);
    }
    entries.sort_by_key(|entry| entry.file_name().to_owned());

    for entry in entries {
        let path = entry.path().to_owned();
        if path.is_dir() {
            collect_rule_files(&path, out)?;
        } else if is_rule_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}
