//! Artefact mirrors.
//!
//! One mirror per artefact class. Each mirrors a single manifest entry from
//! a source endpoint to a destination endpoint; the orchestrator drives them
//! in manifest order and stops at the first failure.
//!
//! - [`image`]: container images, copied by digest with `skopeo`.
//! - [`chart`]: chart archives, downloaded, verified and republished.
//! - [`repository`]: the satellite git repository, force-pushed.

pub mod chart;
pub mod image;
pub mod repository;

pub use chart::{ChartError, ChartFetcher, ChartMirror, ChartPublisher, FetchError, HttpChartClient};
pub use image::{ImageAddresses, ImageMirror, ImageTransfer, ImageTransferError, SkopeoTransfer};
pub use repository::{GitRepositoryMirror, RepositoryMirror};
