//! Manifest resolution.
//!
//! A [`ManifestResolver`] answers one question per pass: has the manifest
//! repository moved since the last successful pass, and if so, what does the
//! new manifest say? [`GitManifestResolver`] answers it from a fresh shallow
//! clone, authenticating the head commit before trusting its contents.

use crate::error::{PassStage, ResolutionError, SyncError};
use crate::git::GitClient;
use crate::manifest::{CommitId, MANIFEST_FILE, Manifest, parse_manifest};
use crate::scratch::ScratchDir;
use crate::signature::{AuthenticityError, CommitVerifier};
use camino::Utf8Path;

/// Outcome of resolving the manifest source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The head commit equals the previous checkpoint.
    Unchanged,
    /// The head moved; `commit` becomes the checkpoint once the pass succeeds.
    Changed {
        /// Candidate checkpoint.
        commit: CommitId,
        /// Decoded manifest at `commit`.
        manifest: Manifest,
    },
}

/// Errors raised while resolving the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The manifest could not be fetched or decoded.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The head commit failed signature verification.
    #[error(transparent)]
    Authenticity(#[from] AuthenticityError),
}

impl ResolveError {
    /// The pass stage in which the error arose.
    #[must_use]
    pub const fn stage(&self) -> PassStage {
        match self {
            Self::Authenticity(_) | Self::Resolution(ResolutionError::RawCommit(_)) => {
                PassStage::Verifying
            }
            Self::Resolution(ResolutionError::ReadManifest { .. } | ResolutionError::Decode(_)) => {
                PassStage::Decoding
            }
            Self::Resolution(_) => PassStage::Resolving,
        }
    }
}

impl From<ResolveError> for SyncError {
    fn from(err: ResolveError) -> Self {
        let stage = err.stage();
        match err {
            ResolveError::Resolution(inner) => Self::new(stage, inner),
            ResolveError::Authenticity(inner) => Self::new(stage, inner),
        }
    }
}

/// Source of the desired state.
pub trait ManifestResolver {
    /// Resolves the manifest relative to the `previous` checkpoint.
    ///
    /// Never advances the checkpoint; the caller does that once the pass
    /// has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the manifest cannot be fetched,
    /// authenticated or decoded.
    fn resolve(&self, previous: Option<&CommitId>) -> Result<Resolution, ResolveError>;
}

/// Resolves the manifest from a git repository.
pub struct GitManifestResolver<'a> {
    git: GitClient<'a>,
    url: String,
    verifier: Option<&'a dyn CommitVerifier>,
}

impl<'a> GitManifestResolver<'a> {
    /// Creates a resolver cloning `url`.
    ///
    /// When `verifier` is `None` the head commit is trusted without a
    /// signature check.
    #[must_use]
    pub fn new(
        git: GitClient<'a>,
        url: impl Into<String>,
        verifier: Option<&'a dyn CommitVerifier>,
    ) -> Self {
        Self {
            git,
            url: url.into(),
            verifier,
        }
    }

    fn verify(
        &self,
        verifier: &dyn CommitVerifier,
        checkout: &Utf8Path,
        head: &CommitId,
    ) -> Result<(), ResolveError> {
        let raw = self
            .git
            .raw_commit(checkout, head.as_str())
            .map_err(ResolutionError::RawCommit)?;
        verifier.verify(head, &raw)?;
        Ok(())
    }
}

impl ManifestResolver for GitManifestResolver<'_> {
    fn resolve(&self, previous: Option<&CommitId>) -> Result<Resolution, ResolveError> {
        let scratch = ScratchDir::new("syncd-manifest-").map_err(ResolutionError::Workspace)?;
        let checkout = scratch.join("checkout");

        log::debug!("cloning manifest repository {}", self.url);
        self.git
            .shallow_clone(&self.url, &checkout)
            .map_err(ResolutionError::Git)?;
        let head_text = self
            .git
            .head_commit(&checkout)
            .map_err(ResolutionError::Git)?;
        let head = CommitId::try_from(head_text).map_err(ResolutionError::InvalidHead)?;

        if previous == Some(&head) {
            log::debug!("manifest head {} unchanged", head.short());
            return Ok(Resolution::Unchanged);
        }

        match self.verifier {
            Some(verifier) => self.verify(verifier, &checkout, &head)?,
            None => log::debug!("no keyring configured; skipping signature check"),
        }

        let path = checkout.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| ResolutionError::ReadManifest {
            path: path.to_string(),
            source,
        })?;
        let manifest = parse_manifest(&text).map_err(ResolutionError::Decode)?;

        log::info!(
            "resolved manifest {} ({} images, {} charts)",
            head.short(),
            manifest.images().len(),
            manifest.charts().len()
        );
        Ok(Resolution::Changed {
            commit: head,
            manifest,
        })
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
