//! Digest newtypes for charts and container images.
//!
//! [`Sha256Digest`] is the chart archive checksum; it is stored lowercase so
//! that comparison against a freshly computed digest is a plain string
//! comparison. [`ImageDigest`] is the content address used to pull an image
//! (`sha256:...`), passed through to the image transfer tool unchanged.

use super::error::{FieldError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// Uppercase input is accepted and normalised.
///
/// # Examples
///
/// ```
/// use syncd::manifest::Sha256Digest;
///
/// let digest = Sha256Digest::try_from("AB".repeat(32)).expect("valid digest");
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Finishes `hasher` and wraps the resulting digest.
    #[must_use]
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Computes the digest of an in-memory payload.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(bytes))
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(FieldError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(FieldError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    Ok(())
}

/// A content-addressed image digest such as `sha256:3f2a...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct ImageDigest(String);

impl ImageDigest {
    /// Return the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ImageDigest {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self> {
        validate_image_digest(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ImageDigest {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self> {
        validate_image_digest(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_image_digest(value: &str) -> Result<()> {
    let invalid = |reason: &str| FieldError::InvalidImageDigest {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    let Some((algorithm, encoded)) = value.split_once(':') else {
        return Err(invalid("expected <algorithm>:<encoded>"));
    };
    if algorithm.is_empty() || encoded.is_empty() {
        return Err(invalid("algorithm and encoded part must not be empty"));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '@'))
    {
        return Err(invalid("digest must not contain whitespace, '/' or '@'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn digest_of_known_payload() {
        // printf 'hello' | sha256sum
        let digest = Sha256Digest::of_bytes(b"hello");
        assert_eq!(
            digest.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn uppercase_digest_is_normalised() {
        let upper = "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824";
        let digest = Sha256Digest::try_from(upper).expect("valid digest");
        assert_eq!(digest, Sha256Digest::of_bytes(b"hello"));
    }

    #[rstest]
    #[case::too_short("abcdef")]
    #[case::too_long("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]
    #[case::non_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaag")]
    fn rejects_malformed_sha256(#[case] value: &str) {
        let err = Sha256Digest::try_from(value).expect_err("should be rejected");
        assert!(matches!(err, FieldError::InvalidSha256Digest { .. }));
    }

    #[rstest]
    #[case::sha256("sha256:AAA")]
    #[case::full("sha256:3f2a9c1e0b7d4f6a8c2e1b0d9f7a6c5e4d3b2a1f0e9d8c7b6a5f4e3d2c1b0a9f")]
    fn accepts_algorithm_prefixed_image_digests(#[case] value: &str) {
        let digest = ImageDigest::try_from(value).expect("valid image digest");
        assert_eq!(digest.as_str(), value);
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_algorithm("AAA")]
    #[case::empty_encoded("sha256:")]
    #[case::path_injection("sha256:abc/../x")]
    fn rejects_malformed_image_digests(#[case] value: &str) {
        assert!(ImageDigest::try_from(value).is_err());
    }
}
