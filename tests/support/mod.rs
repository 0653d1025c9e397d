//! Shared helpers for behaviour tests: in-memory tarball builders and a
//! scripted downloader that counts catalog requests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use codevet_rules::checksum::Digest;
use codevet_rules::extract::{ArchiveExtractor, ExtractionError};
use codevet_rules::identity::RulesetIdentity;
use codevet_rules::remote::download::{DownloadError, RulesetDownload, RulesetDownloader};
use codevet_rules::remote::manifest::RulesetManifest;

/// UTF-8 view of a temp directory joined with `rulesets`.
pub fn utf8_cache_root(temp: &TempDir) -> Utf8PathBuf {
    Utf8Path::from_path(temp.path())
        .expect("temp dir is UTF-8")
        .join("rulesets")
}

/// Build a gzip-framed tarball from `(path, content)` pairs.
pub fn rule_tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        header.set_size(content.len() as u64);
        builder
            .append_data(&mut header, path, content.as_bytes())
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Build a gzip-framed tarball containing one entry with a forged stored
/// name, bypassing `tar::Builder`'s refusal to encode `..`.
pub fn hostile_tarball(raw_name: &[u8], content: &[u8], benign: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_mode(0o644);
    header.set_size(content.len() as u64);
    header.as_old_mut().name[..raw_name.len()].copy_from_slice(raw_name);
    header.set_cksum();
    builder.append(&header, content).expect("append forged entry");

    for (path, body) in benign {
        let mut benign_header = tar::Header::new_gnu();
        benign_header.set_mode(0o644);
        benign_header.set_size(body.len() as u64);
        builder
            .append_data(&mut benign_header, path, body.as_bytes())
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// A download whose manifest digest matches `archive`.
pub fn download_for(identity: &RulesetIdentity, archive: Vec<u8>) -> RulesetDownload {
    let manifest = RulesetManifest {
        name: identity.name().to_owned(),
        version: identity.version().to_owned(),
        checksum: Digest::of_bytes(&archive),
        created_at: Some("2026-07-01T12:00:00Z".to_owned()),
    };
    RulesetDownload { archive, manifest }
}

/// Scripted catalog stand-in: serves a canned download or a canned
/// failure, and counts every request it receives.
pub struct ScriptedDownloader {
    download: Option<RulesetDownload>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDownloader {
    /// A downloader that always serves `download`. Returns the shared
    /// request counter alongside it.
    pub fn serving(download: RulesetDownload) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                download: Some(download),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    /// A downloader that always fails as an unreachable catalog would.
    pub fn failing() -> Self {
        Self {
            download: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl RulesetDownloader for ScriptedDownloader {
    fn download(&self, identity: &RulesetIdentity) -> Result<RulesetDownload, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.download {
            Some(download) => Ok(download.clone()),
            None => Err(DownloadError::Http {
                url: format!(
                    "https://rules.example.test/rulesets/{}/{}/archive",
                    identity.name(),
                    identity.version()
                ),
                reason: "connection refused".to_owned(),
            }),
        }
    }
}

/// An extractor that populates part of the target, then fails.
pub struct TornExtractor;

impl ArchiveExtractor for TornExtractor {
    fn extract(&self, _bytes: &[u8], dest: &std::path::Path) -> Result<(), ExtractionError> {
        std::fs::write(dest.join("partial.yaml"), "id: partial").expect("write partial file");
        Err(ExtractionError::Io(std::io::Error::other("disk full")))
    }
}
