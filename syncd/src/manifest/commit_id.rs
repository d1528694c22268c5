//! Commit identifiers: the checkpoint hash and the revision to mirror.
//!
//! [`CommitId`] is a full object name as printed by `git rev-parse` (40 hex
//! characters for SHA-1 repositories, 64 for SHA-256 ones). [`Revision`] is
//! what a manifest may ask the repository mirror to fetch: a hash or a ref
//! name.

use super::error::{FieldError, Result};
use serde::Deserialize;
use std::fmt;

const SHA1_HEX_LEN: usize = 40;
const SHA256_HEX_LEN: usize = 64;

/// A validated full commit object name.
///
/// # Examples
///
/// ```
/// use syncd::manifest::CommitId;
///
/// let commit = CommitId::try_from("a".repeat(40)).expect("valid commit id");
/// assert_eq!(commit.as_str().len(), 40);
/// assert!(CommitId::try_from("abc1234").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Return the commit id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the first seven characters, as git abbreviates in logs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl TryFrom<&str> for CommitId {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self> {
        validate_commit_id(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for CommitId {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self> {
        validate_commit_id(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for CommitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_commit_id(value: &str) -> Result<()> {
    let invalid = |reason: String| FieldError::InvalidCommitId {
        value: value.to_owned(),
        reason,
    };
    if value.len() != SHA1_HEX_LEN && value.len() != SHA256_HEX_LEN {
        return Err(invalid(format!(
            "expected {SHA1_HEX_LEN} or {SHA256_HEX_LEN} hex characters, got {}",
            value.len()
        )));
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(invalid(format!("non-hex character '{bad}'")));
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("commit id must be lowercase".to_owned()));
    }
    Ok(())
}

/// A commit hash or ref name that the repository mirror fetches.
///
/// Rejects values git would parse as an option, that could not name a
/// single revision, or that are abbreviated hashes. A hex-only ref name
/// such as a branch called `cafe` is therefore refused as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Revision(String);

impl Revision {
    /// Return the revision as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Revision {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self> {
        validate_revision(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Revision {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self> {
        validate_revision(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_revision(value: &str) -> Result<()> {
    let invalid = |reason: &str| FieldError::InvalidRevision {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    if value.is_empty() {
        return Err(invalid("revision must not be empty"));
    }
    if value.starts_with('-') {
        return Err(invalid("revision must not start with '-'"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("revision must not contain whitespace"));
    }
    if value.contains(':') {
        return Err(invalid("revision must not contain ':'"));
    }
    if is_abbreviated_hash(value) {
        return Err(invalid(
            "abbreviated commit hashes cannot be fetched; use the full object name",
        ));
    }
    Ok(())
}

/// Servers only answer fetches for full object names, so a short hex
/// string is rejected even when it could also be a ref name.
fn is_abbreviated_hash(value: &str) -> bool {
    value.len() != SHA1_HEX_LEN
        && value.len() != SHA256_HEX_LEN
        && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sha1("0123456789abcdef0123456789abcdef01234567")]
    #[case::sha256("ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff")]
    fn accepts_full_object_names(#[case] value: &str) {
        assert!(CommitId::try_from(value).is_ok());
    }

    #[rstest]
    #[case::empty("")]
    #[case::abbreviated("abc1234")]
    #[case::uppercase("ABCDEF0123456789ABCDEF0123456789ABCDEF01")]
    #[case::non_hex("gggggggggggggggggggggggggggggggggggggggg")]
    fn rejects_malformed_commit_ids(#[case] value: &str) {
        let err = CommitId::try_from(value).expect_err("should be rejected");
        assert!(matches!(err, FieldError::InvalidCommitId { .. }));
    }

    #[test]
    fn short_form_is_seven_characters() {
        let commit = CommitId::try_from("deadbeef".repeat(5)).expect("valid");
        assert_eq!(commit.short(), "deadbee");
    }

    #[rstest]
    #[case::hash("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef")]
    #[case::branch("main")]
    #[case::full_ref("refs/tags/v1.2.0")]
    fn accepts_hashes_and_ref_names(#[case] value: &str) {
        let revision = Revision::try_from(value).expect("valid revision");
        assert_eq!(revision.as_str(), value);
    }

    #[rstest]
    #[case::empty("")]
    #[case::option_like("--upload-pack=evil")]
    #[case::whitespace("main branch")]
    #[case::refspec("main:refs/heads/master")]
    fn rejects_unsafe_revisions(#[case] value: &str) {
        assert!(Revision::try_from(value).is_err());
    }

    #[rstest]
    #[case::eight("deadbeef")]
    #[case::git_default_abbrev("7541e3b")]
    #[case::one_short("0123456789abcdef0123456789abcdef0123456")]
    fn rejects_abbreviated_hashes(#[case] value: &str) {
        let err = Revision::try_from(value).expect_err("abbreviated hash");
        assert!(err.to_string().contains("full object name"));
    }

    #[test]
    fn accepts_full_sha256_revision() {
        let value = "0a".repeat(32);
        assert!(Revision::try_from(value.as_str()).is_ok());
    }
}
