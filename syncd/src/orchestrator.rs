//! Synchronisation pass orchestration.
//!
//! A pass resolves the manifest against the checkpoint, then mirrors every
//! image, every chart and finally the satellite repository, in manifest
//! order. The first failure ends the pass. The checkpoint advances only when
//! all three stages have completed, so a failed pass is retried in full on
//! the next tick.

use crate::checkpoint::{CheckpointStore, MemoryCheckpoint};
use crate::config::SyncConfig;
use crate::error::{PassStage, Result, SyncError, TransferError};
use crate::manifest::{CommitId, Manifest};
use crate::mirror::chart::{ChartFetcher, ChartMirror, ChartPublisher};
use crate::mirror::image::{ImageMirror, ImageTransfer};
use crate::mirror::repository::RepositoryMirror;
use crate::resolver::{ManifestResolver, Resolution};

/// Result of a pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The manifest head equals the checkpoint; nothing was mirrored.
    Unchanged {
        /// The checkpoint, left as it was.
        checkpoint: Option<CommitId>,
    },
    /// Every artefact was mirrored and the checkpoint advanced.
    Committed {
        /// Checkpoint before the pass.
        previous: Option<CommitId>,
        /// Checkpoint after the pass.
        current: CommitId,
    },
}

/// The external capabilities a pass drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Source of the manifest.
    pub resolver: &'a dyn ManifestResolver,
    /// Image copier.
    pub images: &'a dyn ImageTransfer,
    /// Chart downloader.
    pub chart_fetcher: &'a dyn ChartFetcher,
    /// Chart uploader.
    pub chart_publisher: &'a dyn ChartPublisher,
    /// Satellite repository mirror.
    pub repository: &'a dyn RepositoryMirror,
}

/// Runs synchronisation passes and owns the checkpoint.
pub struct Synchronizer<'a, C = MemoryCheckpoint> {
    config: &'a SyncConfig,
    collaborators: Collaborators<'a>,
    checkpoint: C,
}

impl<'a> Synchronizer<'a> {
    /// Creates a synchroniser that has never completed a pass.
    #[must_use]
    pub fn new(config: &'a SyncConfig, collaborators: Collaborators<'a>) -> Self {
        Self::with_checkpoint(config, collaborators, MemoryCheckpoint::default())
    }
}

impl<'a, C: CheckpointStore> Synchronizer<'a, C> {
    /// Creates a synchroniser backed by `checkpoint`.
    #[must_use]
    pub const fn with_checkpoint(
        config: &'a SyncConfig,
        collaborators: Collaborators<'a>,
        checkpoint: C,
    ) -> Self {
        Self {
            config,
            collaborators,
            checkpoint,
        }
    }

    /// The checkpoint store.
    #[must_use]
    pub const fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    /// Runs one synchronisation pass.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] naming the failing stage (and entry, for mirror
    /// stages). The checkpoint is left untouched.
    pub fn run_pass(&mut self) -> Result<PassOutcome> {
        let previous = self
            .checkpoint
            .load()
            .map_err(|err| SyncError::new(PassStage::Resolving, err))?;
        log::debug!(
            "starting pass from checkpoint {}",
            previous.as_ref().map_or("<none>", CommitId::short)
        );

        let (commit, manifest) = match self.collaborators.resolver.resolve(previous.as_ref())? {
            Resolution::Unchanged => {
                log::info!("manifest unchanged; nothing to do");
                return Ok(PassOutcome::Unchanged {
                    checkpoint: previous,
                });
            }
            Resolution::Changed { commit, manifest } => (commit, manifest),
        };

        self.mirror_images(&manifest)?;
        self.mirror_charts(&manifest)?;
        self.mirror_repository(&manifest)?;

        self.checkpoint
            .store(commit.clone())
            .map_err(|err| SyncError::new(PassStage::Committing, err))?;
        log::info!("synchronised manifest {}", commit.short());
        Ok(PassOutcome::Committed {
            previous,
            current: commit,
        })
    }

    fn mirror_images(&self, manifest: &Manifest) -> Result<()> {
        let mirror = ImageMirror::new(self.collaborators.images);
        let registry = &self.config.registry;
        for (index, entry) in manifest.images().iter().enumerate() {
            mirror
                .mirror(&registry.source, &registry.destination, entry)
                .map_err(|err| SyncError::at_entry(PassStage::MirroringImages, index, err))?;
        }
        log::info!("mirrored {} images", manifest.images().len());
        Ok(())
    }

    fn mirror_charts(&self, manifest: &Manifest) -> Result<()> {
        let mirror = ChartMirror::new(
            self.collaborators.chart_fetcher,
            self.collaborators.chart_publisher,
        );
        let charts = &self.config.charts;
        for (index, entry) in manifest.charts().iter().enumerate() {
            mirror
                .mirror(&charts.source, charts.destination.as_deref(), entry)
                .map_err(|err| SyncError::at_entry(PassStage::MirroringCharts, index, err))?;
        }
        log::info!("mirrored {} charts", manifest.charts().len());
        Ok(())
    }

    fn mirror_repository(&self, manifest: &Manifest) -> Result<()> {
        let reference = manifest.repository();
        let endpoints = &self.config.repository;
        self.collaborators
            .repository
            .mirror(&endpoints.source, &endpoints.destination, reference)
            .map_err(|source| {
                SyncError::new(
                    PassStage::MirroringRepository,
                    TransferError::Repository {
                        commit: reference.commit().to_string(),
                        source,
                    },
                )
            })?;
        log::info!("mirrored repository commit {}", reference.commit());
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
