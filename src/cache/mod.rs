//! Ruleset cache subsystem.
//!
//! The cache keeps one directory per `(name, version)` under the per-user
//! cache root, each holding the extracted rule files plus two sidecars:
//! the metadata record driving freshness decisions and the provenance
//! manifest reconstructed at download time.
//!
//! # Sub-modules
//!
//! - [`listing`] — Enumeration of cached entries.
//! - [`manager`] — Fetch-validate-cache-serve orchestration.
//! - [`metadata`] — Metadata sidecar schema and freshness predicates.

pub mod listing;
pub mod manager;
pub mod metadata;
