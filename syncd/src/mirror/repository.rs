//! Satellite repository mirroring.
//!
//! The referenced commit is fetched from the source repository into a
//! throwaway bare repository and force-pushed onto the destination mainline
//! branch. The destination history is replaced, not merged.

use crate::git::{GitClient, GitError};
use crate::manifest::RepositoryReference;
use crate::scratch::ScratchDir;

/// Branch the mirrored commit is pushed to unless configured otherwise.
pub const DEFAULT_MAINLINE_BRANCH: &str = "master";

const SOURCE_REMOTE: &str = "src";
const DESTINATION_REMOTE: &str = "dst";

/// Mirrors one commit of a git repository.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryMirror {
    /// Makes the destination mainline point at `reference.commit()` as found
    /// in `source`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if any git step fails, including remote creation.
    fn mirror(
        &self,
        source: &str,
        destination: &str,
        reference: &RepositoryReference,
    ) -> Result<(), GitError>;
}

/// [`RepositoryMirror`] driving the `git` command line.
pub struct GitRepositoryMirror<'a> {
    git: GitClient<'a>,
    mainline: String,
}

impl<'a> GitRepositoryMirror<'a> {
    /// Creates a mirror pushing to `mainline` on the destination.
    #[must_use]
    pub fn new(git: GitClient<'a>, mainline: impl Into<String>) -> Self {
        Self {
            git,
            mainline: mainline.into(),
        }
    }
}

impl RepositoryMirror for GitRepositoryMirror<'_> {
    fn mirror(
        &self,
        source: &str,
        destination: &str,
        reference: &RepositoryReference,
    ) -> Result<(), GitError> {
        let workspace = ScratchDir::new("syncd-mirror-").map_err(|err| GitError::Failed {
            operation: "init",
            message: format!("cannot create temporary repository: {err}"),
        })?;
        let repo = workspace.path();
        let commit = reference.commit().as_str();

        log::info!(
            "mirroring commit {commit} from {source} to {destination} ({})",
            self.mainline
        );
        self.git.init_bare(repo)?;
        self.git.add_remote(repo, SOURCE_REMOTE, source)?;
        self.git.add_remote(repo, DESTINATION_REMOTE, destination)?;
        self.git.fetch(repo, SOURCE_REMOTE, commit)?;
        self.git.force_push(
            repo,
            DESTINATION_REMOTE,
            &format!("FETCH_HEAD:refs/heads/{}", self.mainline),
        )?;
        Ok(())
    }
}
