//! Git operations used by the manifest resolver and the repository mirror.
//!
//! All operations drive the `git` executable through a [`CommandExecutor`],
//! addressing repositories with `git -C <dir>` rather than changing the
//! process working directory.

use crate::exec::{CommandError, CommandExecutor, combined_output};
use camino::Utf8Path;
use std::process::Output;

/// Errors raised by git operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// The git executable could not be run to completion.
    #[error("git {operation} could not run: {source}")]
    Command {
        /// The git operation being attempted (clone, fetch, ...).
        operation: &'static str,
        /// Underlying execution failure.
        #[source]
        source: CommandError,
    },

    /// Git ran but reported a failure.
    #[error("git {operation} failed: {message}")]
    Failed {
        /// The git operation that failed.
        operation: &'static str,
        /// Combined tool output describing the failure.
        message: String,
    },

    /// Git produced output that is not valid UTF-8.
    #[error("git {operation} produced non UTF-8 output")]
    NonUtf8Output {
        /// The git operation whose output could not be decoded.
        operation: &'static str,
    },
}

/// Thin wrapper over the `git` command line.
#[derive(Clone, Copy)]
pub struct GitClient<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> GitClient<'a> {
    /// Creates a client that runs git through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Clones `url` into `target` keeping only the tip commit.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the clone fails.
    pub fn shallow_clone(&self, url: &str, target: &Utf8Path) -> Result<(), GitError> {
        self.run(
            "clone",
            &["clone", "--depth", "1", "--quiet", "--", url, target.as_str()],
        )?;
        Ok(())
    }

    /// Resolves the commit `HEAD` points at inside `repo`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `rev-parse` fails.
    pub fn head_commit(&self, repo: &Utf8Path) -> Result<String, GitError> {
        let output = self.run("rev-parse", &["-C", repo.as_str(), "rev-parse", "HEAD"])?;
        Ok(stdout_text("rev-parse", output)?.trim().to_owned())
    }

    /// Returns the raw commit object for `commit`, signature headers included.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `cat-file` fails or prints non UTF-8 text.
    pub fn raw_commit(&self, repo: &Utf8Path, commit: &str) -> Result<String, GitError> {
        let output = self.run(
            "cat-file",
            &["-C", repo.as_str(), "cat-file", "commit", commit],
        )?;
        stdout_text("cat-file", output)
    }

    /// Initialises an empty bare repository at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `init` fails.
    pub fn init_bare(&self, target: &Utf8Path) -> Result<(), GitError> {
        self.run("init", &["init", "--bare", "--quiet", target.as_str()])?;
        Ok(())
    }

    /// Registers a named remote inside `repo`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the remote cannot be created.
    pub fn add_remote(&self, repo: &Utf8Path, name: &str, url: &str) -> Result<(), GitError> {
        self.run(
            "remote add",
            &["-C", repo.as_str(), "remote", "add", name, url],
        )?;
        Ok(())
    }

    /// Fetches `refspec` from `remote`; git records the result in `FETCH_HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the fetch fails.
    pub fn fetch(&self, repo: &Utf8Path, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.run(
            "fetch",
            &["-C", repo.as_str(), "fetch", "--quiet", remote, refspec],
        )?;
        Ok(())
    }

    /// Force-pushes `refspec` to `remote`, discarding the remote history.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the push fails.
    pub fn force_push(&self, repo: &Utf8Path, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.run(
            "push",
            &["-C", repo.as_str(), "push", "--force", "--quiet", remote, refspec],
        )?;
        Ok(())
    }

    fn run(&self, operation: &'static str, args: &[&str]) -> Result<Output, GitError> {
        let output = self
            .executor
            .run("git", args)
            .map_err(|source| GitError::Command { operation, source })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                operation,
                message: combined_output(&output),
            });
        }

        Ok(output)
    }
}

fn stdout_text(operation: &'static str, output: Output) -> Result<String, GitError> {
    String::from_utf8(output.stdout).map_err(|_| GitError::NonUtf8Output { operation })
}
