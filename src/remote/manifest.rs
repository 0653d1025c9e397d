//! Ruleset provenance manifests.
//!
//! The catalog does not ship a JSON manifest envelope; provenance travels
//! as response headers next to the raw archive body. The reconstructed
//! manifest is persisted inside the cache entry for auditability. Beyond
//! the checksum cross-check it is never authoritative for cache logic.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checksum::Digest;

/// Filename of the manifest sidecar inside a cache entry.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Provenance record for one downloaded ruleset archive.
///
/// `created_at` is stored as an opaque string: the catalog stamps it, and
/// nothing in the cache layer does arithmetic on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetManifest {
    /// Ruleset name as declared by the catalog.
    pub name: String,
    /// Version tag as declared by the catalog.
    pub version: String,
    /// SHA-256 digest the catalog declared for the archive.
    pub checksum: Digest,
    /// Catalog-side creation timestamp, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl RulesetManifest {
    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Persist the manifest sidecar at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = self.to_pretty_json().map_err(io::Error::other)?;
        std::fs::write(path, json)
    }
}
