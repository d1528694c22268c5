//! Error types for a synchronisation pass.
//!
//! Each collaborator reports its own error type; the orchestrator wraps
//! whichever one ended the pass in a [`SyncError`] that also names the
//! [`PassStage`] and, for mirror failures, the index of the offending entry.

use crate::git::GitError;
use crate::manifest::{FieldError, ManifestParseError};
use crate::mirror::chart::{ChartError, FetchError};
use crate::mirror::image::ImageTransferError;
use crate::signature::AuthenticityError;
use std::fmt;
use thiserror::Error;

/// Errors raised while fetching and decoding the manifest.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The temporary checkout directory could not be created.
    #[error("cannot prepare manifest checkout: {0}")]
    Workspace(#[source] std::io::Error),

    /// Cloning or inspecting the manifest repository failed.
    #[error("cannot fetch manifest repository: {0}")]
    Git(#[source] GitError),

    /// The head commit could not be read for signature verification.
    #[error("cannot read manifest commit object: {0}")]
    RawCommit(#[source] GitError),

    /// `rev-parse HEAD` printed something that is not a commit id.
    #[error("manifest head is not a commit id: {0}")]
    InvalidHead(#[source] FieldError),

    /// `manifest.json` is missing from the checkout or unreadable.
    #[error("cannot read manifest {path}: {source}")]
    ReadManifest {
        /// Path of the manifest inside the checkout.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `manifest.json` is not a valid manifest document.
    #[error("cannot decode manifest: {0}")]
    Decode(#[from] ManifestParseError),
}

/// A chart archive whose digest differs from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("digest mismatch for chart {chart}: expected {expected}, got {actual}")]
pub struct IntegrityError {
    /// Chart identity, `name version`.
    pub chart: String,
    /// Digest declared in the manifest.
    pub expected: String,
    /// Digest computed over the downloaded archive.
    pub actual: String,
}

/// Errors raised while copying an artefact to its destination.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The image transfer tool failed.
    #[error("cannot copy image {image}: {source}")]
    Image {
        /// Image identity as written in the manifest.
        image: String,
        /// Transfer failure.
        #[source]
        source: ImageTransferError,
    },

    /// The destination chart repository rejected the upload.
    #[error("cannot publish chart {chart}: {source}")]
    Chart {
        /// Chart identity, `name version`.
        chart: String,
        /// Upload failure.
        #[source]
        source: FetchError,
    },

    /// Fetching or pushing the satellite repository failed.
    #[error("cannot mirror repository commit {commit}: {source}")]
    Repository {
        /// The commit being mirrored.
        commit: String,
        /// Git failure.
        #[source]
        source: GitError,
    },
}

/// Errors raised by a checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The store could not be read or written.
    #[error("checkpoint store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// The step of a pass that was running when it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    /// Cloning the manifest repository and reading its head.
    Resolving,
    /// Checking the head commit signature.
    Verifying,
    /// Reading and decoding `manifest.json`.
    Decoding,
    /// Copying images.
    MirroringImages,
    /// Downloading, verifying and publishing charts.
    MirroringCharts,
    /// Mirroring the satellite repository.
    MirroringRepository,
    /// Advancing the checkpoint.
    Committing,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolving => "resolving manifest",
            Self::Verifying => "verifying manifest signature",
            Self::Decoding => "decoding manifest",
            Self::MirroringImages => "mirroring images",
            Self::MirroringCharts => "mirroring charts",
            Self::MirroringRepository => "mirroring repository",
            Self::Committing => "committing checkpoint",
        };
        f.write_str(label)
    }
}

/// The underlying cause of a failed pass.
#[derive(Debug, Error)]
pub enum SyncErrorKind {
    /// The manifest could not be fetched or decoded.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The manifest commit is not signed by a trusted key.
    #[error(transparent)]
    Authenticity(#[from] AuthenticityError),

    /// A chart could not be fetched, verified or published.
    #[error(transparent)]
    Chart(#[from] ChartError),

    /// An image or the repository could not be copied.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The checkpoint could not be read or advanced.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// A failed synchronisation pass.
///
/// The checkpoint is never advanced when a pass returns this error.
#[derive(Debug)]
pub struct SyncError {
    stage: PassStage,
    entry: Option<usize>,
    kind: SyncErrorKind,
}

impl SyncError {
    /// Creates an error for a stage that is not tied to one manifest entry.
    #[must_use]
    pub fn new(stage: PassStage, kind: impl Into<SyncErrorKind>) -> Self {
        Self {
            stage,
            entry: None,
            kind: kind.into(),
        }
    }

    /// Creates an error for the entry at `index` within a mirror stage.
    #[must_use]
    pub fn at_entry(stage: PassStage, index: usize, kind: impl Into<SyncErrorKind>) -> Self {
        Self {
            stage,
            entry: Some(index),
            kind: kind.into(),
        }
    }

    /// The stage that failed.
    #[must_use]
    pub const fn stage(&self) -> PassStage {
        self.stage
    }

    /// Zero-based index of the failing manifest entry, for mirror stages.
    #[must_use]
    pub const fn entry(&self) -> Option<usize> {
        self.entry
    }

    /// The underlying cause.
    #[must_use]
    pub const fn kind(&self) -> &SyncErrorKind {
        &self.kind
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass failed while {}", self.stage)?;
        if let Some(index) = self.entry {
            write!(f, " (entry {index})")?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Errors that stop the daemon process.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The logger could not be installed.
    #[error("cannot initialise logging: {0}")]
    Logging(#[from] log::SetLoggerError),

    /// The configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The single pass requested with `--once` failed. The cause has
    /// already been logged.
    #[error("synchronisation pass failed")]
    PassFailed,
}

/// Result type for synchronisation passes.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_names_stage_and_entry() {
        let err = SyncError::at_entry(
            PassStage::MirroringCharts,
            2,
            ChartError::Integrity(IntegrityError {
                chart: "web 1.0".to_owned(),
                expected: "aa".to_owned(),
                actual: "bb".to_owned(),
            }),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("pass failed while mirroring charts (entry 2):"));
        assert!(msg.contains("expected aa, got bb"));
        assert_eq!(err.entry(), Some(2));
    }

    #[test]
    fn daemon_error_shows_config_problem_verbatim() {
        let err = DaemonError::from(crate::config::ConfigError::Missing {
            setting: "manifest-git-repository",
        });
        assert_eq!(
            err.to_string(),
            "missing required setting --manifest-git-repository"
        );
    }

    #[test]
    fn stage_level_error_has_no_entry() {
        let err = SyncError::new(
            PassStage::Committing,
            CheckpointError::Unavailable {
                message: "store offline".to_owned(),
            },
        );
        assert_eq!(err.entry(), None);
        assert_eq!(
            err.to_string(),
            "pass failed while committing checkpoint: checkpoint store unavailable: store offline"
        );
    }
}
