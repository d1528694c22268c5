//! Error types for manifest field validation.
//!
//! Each variant identifies the rejected value and the constraint it broke.

use thiserror::Error;

/// Errors arising from invalid manifest or checkpoint values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A commit object name is not a full lowercase hex hash.
    #[error("invalid commit id \"{value}\": {reason}")]
    InvalidCommitId {
        /// The rejected value.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A revision to mirror is empty or could be mistaken for a git option.
    #[error("invalid revision \"{value}\": {reason}")]
    InvalidRevision {
        /// The rejected value.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A chart digest is not a 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// An image digest is not of the form `algorithm:encoded`.
    #[error("invalid image digest \"{value}\": {reason}")]
    InvalidImageDigest {
        /// The rejected value.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`FieldError`].
pub type Result<T> = std::result::Result<T, FieldError>;
