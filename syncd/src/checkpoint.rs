//! Checkpoint of the last fully synchronised manifest commit.

use crate::error::CheckpointError;
use crate::manifest::CommitId;

/// Storage for the last synchronised manifest commit.
pub trait CheckpointStore {
    /// Returns the checkpoint, or `None` if no pass has succeeded yet.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be read.
    fn load(&self) -> Result<Option<CommitId>, CheckpointError>;

    /// Replaces the checkpoint with `commit`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be written.
    fn store(&mut self, commit: CommitId) -> Result<(), CheckpointError>;
}

/// A checkpoint held in process memory; lost on restart.
///
/// # Examples
///
/// ```
/// use syncd::checkpoint::{CheckpointStore, MemoryCheckpoint};
/// use syncd::manifest::CommitId;
///
/// let mut checkpoint = MemoryCheckpoint::default();
/// assert_eq!(checkpoint.load().expect("load"), None);
///
/// let commit = CommitId::try_from("a".repeat(40)).expect("commit id");
/// checkpoint.store(commit.clone()).expect("store");
/// assert_eq!(checkpoint.load().expect("load"), Some(commit));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCheckpoint {
    commit: Option<CommitId>,
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<CommitId>, CheckpointError> {
        Ok(self.commit.clone())
    }

    fn store(&mut self, commit: CommitId) -> Result<(), CheckpointError> {
        self.commit = Some(commit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(fill: &str) -> CommitId {
        CommitId::try_from(fill.repeat(40)).expect("valid commit id")
    }

    #[test]
    fn new_checkpoint_is_unset() {
        assert_eq!(MemoryCheckpoint::default().load().expect("load"), None);
    }

    #[test]
    fn store_replaces_the_previous_commit() {
        let mut checkpoint = MemoryCheckpoint::default();
        checkpoint.store(commit("a")).expect("store");
        checkpoint.store(commit("b")).expect("store");

        assert_eq!(checkpoint.load().expect("load"), Some(commit("b")));
    }
}
