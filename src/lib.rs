//! Codevet ruleset cache and retrieval library.
//!
//! This crate owns the durable local state of the Codevet scanner: it fetches
//! versioned rule packages from the remote catalog, verifies their integrity,
//! extracts them into a per-user cache, and serves the cached copy on
//! subsequent runs. It also provides the rule-source abstraction that merges
//! local rule files and cache-backed remote rulesets into the ordered path
//! list consumed by the scan orchestrator.
//!
//! # Modules
//!
//! - [`cache`] - Cache manager, metadata sidecars, and cache listing
//! - [`checksum`] - SHA-256 digests for archive verification
//! - [`config`] - Remote catalog configuration
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`extract`] - Secure archive extraction with traversal and bomb guards
//! - [`identity`] - Validated ruleset name/version identity
//! - [`remote`] - Remote catalog downloader capability and manifest types
//! - [`source`] - Rule source variants and multi-source aggregation

pub mod cache;
pub mod checksum;
pub mod config;
pub mod dirs;
pub mod extract;
pub mod identity;
pub mod remote;
pub mod source;
