//! SHA-256 content digests for ruleset archives.
//!
//! The catalog declares a digest for every archive it serves; the cache
//! layer recomputes it over the downloaded bytes before anything touches
//! the filesystem. Digests are fixed-length lowercase hex strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Errors arising from digest parsing and verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    /// The digest string is not 64 characters of lowercase hex.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidDigest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The computed digest does not match the declared one.
    #[error("checksum mismatch: declared {expected}, computed {actual}")]
    Mismatch {
        /// The digest the catalog declared.
        expected: String,
        /// The digest computed over the received bytes.
        actual: String,
    },
}

/// A validated hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use codevet_rules::checksum::Digest;
///
/// let digest = Digest::of_bytes(b"hello world");
/// assert_eq!(digest.as_str().len(), 64);
/// assert_eq!(Digest::of_bytes(b"hello world"), digest);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of a byte string.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Parse a digest from its hex representation.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::InvalidDigest`] when the value has the wrong
    /// length, contains non-hex characters, or uses uppercase hex.
    pub fn parse(value: &str) -> Result<Self, ChecksumError> {
        if value.len() != DIGEST_HEX_LEN {
            return Err(ChecksumError::InvalidDigest {
                reason: format!("expected {DIGEST_HEX_LEN} hex characters, got {}", value.len()),
            });
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !c.is_ascii_hexdigit() || c.is_ascii_uppercase())
        {
            return Err(ChecksumError::InvalidDigest {
                reason: format!("unexpected character {bad:?}"),
            });
        }
        Ok(Self(value.to_owned()))
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Digest {
    type Error = ChecksumError;

    fn try_from(value: String) -> Result<Self, ChecksumError> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// Verify that `bytes` hash to the declared digest.
///
/// # Errors
///
/// Returns [`ChecksumError::Mismatch`] carrying both digests when they
/// differ.
pub fn verify_bytes(bytes: &[u8], expected: &Digest) -> Result<(), ChecksumError> {
    let actual = Digest::of_bytes(bytes);
    if actual != *expected {
        return Err(ChecksumError::Mismatch {
            expected: expected.as_str().to_owned(),
            actual: actual.as_str().to_owned(),
        });
    }
    Ok(())
}
