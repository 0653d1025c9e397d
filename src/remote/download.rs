//! Ruleset download trait and HTTP implementation.
//!
//! The cache manager never talks HTTP directly; it receives a
//! [`RulesetDownloader`] so tests can exercise every cache path against a
//! fake. The production implementation speaks the catalog wire contract:
//! provenance headers plus the raw archive body, no JSON envelope.

use ureq::http::HeaderMap;

use crate::checksum::Digest;
use crate::config::RemoteConfig;
use crate::identity::RulesetIdentity;
use crate::remote::manifest::RulesetManifest;

/// Header carrying the catalog-declared ruleset name.
pub const NAME_HEADER: &str = "x-codevet-ruleset-name";
/// Header carrying the catalog-declared version tag.
pub const VERSION_HEADER: &str = "x-codevet-ruleset-version";
/// Header carrying the archive SHA-256 digest. Required.
pub const CHECKSUM_HEADER: &str = "x-codevet-ruleset-checksum";
/// Header carrying the catalog-side creation timestamp. Optional.
pub const CREATED_AT_HEADER: &str = "x-codevet-ruleset-created-at";

/// Upper bound on an archive body read from the catalog.
const MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;

/// Errors arising from catalog download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The HTTP request failed or returned a non-success status.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The catalog has no such ruleset or version (HTTP 404).
    #[error("ruleset {identity} not found in the catalog")]
    NotFound {
        /// The `name@version` identity that was requested.
        identity: String,
    },

    /// A required provenance header was absent from the response.
    #[error("catalog response is missing the {name} header")]
    MissingHeader {
        /// The absent header name.
        name: &'static str,
    },

    /// A provenance header was present but unparseable.
    #[error("catalog response header {name} is invalid: {reason}")]
    InvalidHeader {
        /// The offending header name.
        name: &'static str,
        /// Description of the parse failure.
        reason: String,
    },
}

/// One successful catalog fetch: the archive bytes and their provenance.
#[derive(Debug, Clone)]
pub struct RulesetDownload {
    /// The compressed archive body, exactly as received.
    pub archive: Vec<u8>,
    /// Provenance reconstructed from the response headers.
    pub manifest: RulesetManifest,
}

/// Trait for fetching ruleset archives from the catalog.
///
/// Abstraction allows cache tests to run without a network stack.
#[cfg_attr(test, mockall::automock)]
pub trait RulesetDownloader {
    /// Fetch the archive and reconstructed manifest for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the request fails, the ruleset is
    /// unknown, or the response violates the header contract.
    fn download(&self, identity: &RulesetIdentity) -> Result<RulesetDownload, DownloadError>;
}

/// HTTP-based downloader using `ureq`.
///
/// The agent is owned by the instance and configured from the passed-in
/// [`RemoteConfig`]; there is no process-wide client state.
pub struct HttpRulesetDownloader {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpRulesetDownloader {
    /// Build a downloader for the configured catalog.
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    /// Construct the archive URL for a ruleset identity.
    fn archive_url(&self, identity: &RulesetIdentity) -> String {
        format!(
            "{}/rulesets/{}/{}/archive",
            self.config.base_url.trim_end_matches('/'),
            identity.name(),
            identity.version()
        )
    }
}

impl RulesetDownloader for HttpRulesetDownloader {
    fn download(&self, identity: &RulesetIdentity) -> Result<RulesetDownload, DownloadError> {
        let url = self.archive_url(identity);
        let mut request = self.agent.get(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("authorization", format!("Bearer {api_key}"));
        }
        let response = request
            .call()
            .map_err(|e| map_ureq_error(&url, identity, &e))?;

        let manifest = manifest_from_headers(identity, response.headers())?;
        let archive = response
            .into_body()
            .with_config()
            .limit(MAX_ARCHIVE_BYTES)
            .read_to_vec()
            .map_err(|e| DownloadError::Http {
                url,
                reason: e.to_string(),
            })?;

        Ok(RulesetDownload { archive, manifest })
    }
}

/// Reconstruct a manifest from catalog response headers.
///
/// The checksum header is mandatory; name and version fall back to the
/// requested identity when the catalog omits them.
fn manifest_from_headers(
    identity: &RulesetIdentity,
    headers: &HeaderMap,
) -> Result<RulesetManifest, DownloadError> {
    let checksum_raw = header_value(headers, CHECKSUM_HEADER)?
        .ok_or(DownloadError::MissingHeader {
            name: CHECKSUM_HEADER,
        })?;
    let checksum = Digest::parse(&checksum_raw).map_err(|e| DownloadError::InvalidHeader {
        name: CHECKSUM_HEADER,
        reason: e.to_string(),
    })?;

    let name =
        header_value(headers, NAME_HEADER)?.unwrap_or_else(|| identity.name().to_owned());
    let version =
        header_value(headers, VERSION_HEADER)?.unwrap_or_else(|| identity.version().to_owned());
    let created_at = header_value(headers, CREATED_AT_HEADER)?;

    Ok(RulesetManifest {
        name,
        version,
        checksum,
        created_at,
    })
}

/// Read an optional header as a UTF-8 string.
fn header_value(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<Option<String>, DownloadError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|e| DownloadError::InvalidHeader {
            name,
            reason: e.to_string(),
        })?;
    Ok(Some(value.to_owned()))
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, identity: &RulesetIdentity, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            identity: identity.to_string(),
        },
        other => DownloadError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ureq::http::HeaderValue;

    fn identity() -> RulesetIdentity {
        RulesetIdentity::new("dca", "latest").expect("valid identity")
    }

    fn headers_with_checksum(digest: &Digest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CHECKSUM_HEADER,
            HeaderValue::from_str(digest.as_str()).expect("hex is a valid header value"),
        );
        headers
    }

    #[test]
    fn archive_url_includes_name_and_version() {
        let downloader =
            HttpRulesetDownloader::new(RemoteConfig::new("https://rules.example.test/"));
        let url = downloader.archive_url(&identity());
        assert_eq!(url, "https://rules.example.test/rulesets/dca/latest/archive");
    }

    #[test]
    fn manifest_reconstruction_uses_all_headers() {
        let digest = Digest::of_bytes(b"archive");
        let mut headers = headers_with_checksum(&digest);
        headers.insert(NAME_HEADER, HeaderValue::from_static("dca"));
        headers.insert(VERSION_HEADER, HeaderValue::from_static("2024.11.0"));
        headers.insert(
            CREATED_AT_HEADER,
            HeaderValue::from_static("2026-07-01T12:00:00Z"),
        );

        let manifest = manifest_from_headers(&identity(), &headers).expect("valid headers");
        assert_eq!(manifest.name, "dca");
        assert_eq!(manifest.version, "2024.11.0");
        assert_eq!(manifest.checksum, digest);
        assert_eq!(manifest.created_at.as_deref(), Some("2026-07-01T12:00:00Z"));
    }

    #[test]
    fn name_and_version_default_to_requested_identity() {
        let digest = Digest::of_bytes(b"archive");
        let headers = headers_with_checksum(&digest);

        let manifest = manifest_from_headers(&identity(), &headers).expect("valid headers");
        assert_eq!(manifest.name, "dca");
        assert_eq!(manifest.version, "latest");
        assert_eq!(manifest.created_at, None);
    }

    #[test]
    fn missing_checksum_header_is_rejected() {
        let err = manifest_from_headers(&identity(), &HeaderMap::new())
            .expect_err("expected missing header");
        assert!(matches!(
            err,
            DownloadError::MissingHeader {
                name: CHECKSUM_HEADER
            }
        ));
    }

    #[test]
    fn malformed_checksum_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(CHECKSUM_HEADER, HeaderValue::from_static("not-hex"));

        let err =
            manifest_from_headers(&identity(), &headers).expect_err("expected invalid header");
        assert!(matches!(
            err,
            DownloadError::InvalidHeader {
                name: CHECKSUM_HEADER,
                ..
            }
        ));
    }

    #[test]
    fn non_utf8_header_value_is_rejected() {
        let digest = Digest::of_bytes(b"archive");
        let mut headers = headers_with_checksum(&digest);
        headers.insert(
            NAME_HEADER,
            HeaderValue::from_bytes(&[0xff]).expect("opaque bytes are legal header values"),
        );

        let err =
            manifest_from_headers(&identity(), &headers).expect_err("expected invalid header");
        assert!(matches!(
            err,
            DownloadError::InvalidHeader {
                name: NAME_HEADER,
                ..
            }
        ));
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://rules.example.test/x", &identity(), &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http() {
        let err = ureq::Error::StatusCode(503);
        let mapped = map_ureq_error("https://rules.example.test/x", &identity(), &err);
        assert!(matches!(mapped, DownloadError::Http { .. }));
    }
}
