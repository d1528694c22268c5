//! Manifest-driven mirror synchronisation.
//!
//! `syncd` polls a git repository holding a signed `manifest.json` and
//! mirrors the container images, chart archives and satellite git commit it
//! names from source endpoints to destination endpoints. A checkpoint of the
//! last fully mirrored manifest commit lets unchanged ticks finish without
//! touching any artefact.
//!
//! # Modules
//!
//! - [`checkpoint`] - Last synchronised manifest commit
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Validated daemon configuration
//! - [`error`] - Pass and daemon error types
//! - [`exec`] - External command execution with timeouts
//! - [`git`] - Git command wrapper
//! - [`logging`] - Log backend set-up
//! - [`manifest`] - Manifest model and decoding
//! - [`mirror`] - Image, chart and repository mirrors
//! - [`orchestrator`] - Synchronisation passes
//! - [`resolver`] - Manifest resolution and authentication
//! - [`scheduler`] - Fixed-interval pass loop
//! - [`scratch`] - Per-pass temporary directories
//! - [`signature`] - Commit signature verification

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod logging;
pub mod manifest;
pub mod mirror;
pub mod orchestrator;
pub mod resolver;
pub mod scheduler;
pub mod scratch;
pub mod signature;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
