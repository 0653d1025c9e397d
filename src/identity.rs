//! Validated ruleset identity.
//!
//! A ruleset is addressed by `(name, version)`. Both parts become path
//! segments under the cache root, so construction rejects anything that
//! could redirect cache writes outside the entry directory.

use std::fmt;

use thiserror::Error;

/// The floating version tag that always resolves to the newest release.
pub const LATEST_VERSION: &str = "latest";

/// Errors arising from invalid ruleset identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The ruleset name is empty or contains forbidden characters.
    #[error("invalid ruleset name \"{value}\": {reason}")]
    InvalidName {
        /// The rejected name.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The ruleset version is empty or contains forbidden characters.
    #[error("invalid ruleset version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// A validated `(name, version)` pair identifying one ruleset.
///
/// # Examples
///
/// ```
/// use codevet_rules::identity::RulesetIdentity;
///
/// let identity = RulesetIdentity::new("dca", "latest").expect("valid identity");
/// assert!(identity.is_latest());
/// assert_eq!(identity.to_string(), "dca@latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulesetIdentity {
    name: String,
    version: String,
}

impl RulesetIdentity {
    /// Construct an identity from a name and a version tag.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when either part is empty, is `.` or `..`,
    /// or contains a path separator, `@`, or whitespace.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let name = name.into();
        let version = version.into();
        if let Err(reason) = validate_segment(&name) {
            return Err(IdentityError::InvalidName {
                value: name,
                reason,
            });
        }
        if let Err(reason) = validate_segment(&version) {
            return Err(IdentityError::InvalidVersion {
                value: version,
                reason,
            });
        }
        Ok(Self { name, version })
    }

    /// Construct an identity pointing at the floating `latest` tag.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidName`] when the name is not a valid
    /// path segment.
    pub fn latest(name: impl Into<String>) -> Result<Self, IdentityError> {
        Self::new(name, LATEST_VERSION)
    }

    /// Parse a `name@version` spec string; a bare `name` means `latest`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when either side of the `@` fails segment
    /// validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use codevet_rules::identity::RulesetIdentity;
    ///
    /// let pinned = RulesetIdentity::parse_spec("dca@2024.11.0").expect("valid spec");
    /// assert_eq!(pinned.version(), "2024.11.0");
    ///
    /// let floating = RulesetIdentity::parse_spec("dca").expect("valid spec");
    /// assert_eq!(floating.version(), "latest");
    /// ```
    pub fn parse_spec(spec: &str) -> Result<Self, IdentityError> {
        match spec.split_once('@') {
            Some((name, version)) => Self::new(name, version),
            None => Self::latest(spec),
        }
    }

    /// Return the ruleset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the version tag.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether this identity tracks the floating `latest` tag.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version == LATEST_VERSION
    }
}

impl fmt::Display for RulesetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Validate that `value` is usable as a single path segment.
fn validate_segment(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_owned());
    }
    if value == "." || value == ".." {
        return Err("must not be a relative path component".to_owned());
    }
    if let Some(bad) = value
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '@') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("contains forbidden character {bad:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn new_accepts_name_and_version() {
        let identity = RulesetIdentity::new("dca", "2024.11.0").expect("valid identity");
        assert_eq!(identity.name(), "dca");
        assert_eq!(identity.version(), "2024.11.0");
        assert!(!identity.is_latest());
    }

    #[test]
    fn latest_uses_floating_tag() {
        let identity = RulesetIdentity::latest("dca").expect("valid identity");
        assert_eq!(identity.version(), LATEST_VERSION);
        assert!(identity.is_latest());
    }

    #[rstest]
    #[case::bare_name("dca", "dca", "latest")]
    #[case::pinned("dca@1.4.0", "dca", "1.4.0")]
    #[case::explicit_latest("security-audit@latest", "security-audit", "latest")]
    fn parse_spec_valid(
        #[case] spec: &str,
        #[case] expected_name: &str,
        #[case] expected_version: &str,
    ) {
        let identity = RulesetIdentity::parse_spec(spec).expect("valid spec");
        assert_eq!(identity.name(), expected_name);
        assert_eq!(identity.version(), expected_version);
    }

    #[rstest]
    #[case::empty("")]
    #[case::empty_version("dca@")]
    #[case::slash_in_name("../dca")]
    #[case::backslash_in_version("dca@..\\evil")]
    #[case::nested_separator("dca@v1/..")]
    #[case::whitespace("my rules")]
    fn parse_spec_invalid(#[case] spec: &str) {
        assert!(
            RulesetIdentity::parse_spec(spec).is_err(),
            "expected rejection for {spec:?}"
        );
    }

    #[rstest]
    #[case::dot(".")]
    #[case::dot_dot("..")]
    fn new_rejects_relative_components(#[case] version: &str) {
        let err = RulesetIdentity::new("dca", version).expect_err("expected rejection");
        assert!(matches!(err, IdentityError::InvalidVersion { .. }));
    }

    #[test]
    fn display_is_spec_form() {
        let identity = RulesetIdentity::new("dca", "1.4.0").expect("valid identity");
        assert_eq!(format!("{identity}"), "dca@1.4.0");
    }
}
