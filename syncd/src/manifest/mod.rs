//! Manifest data model and decoding.
//!
//! - [`commit_id`]: checkpoint commit ids and mirrorable revisions.
//! - [`digest`]: chart SHA-256 and image content digests.
//! - [`error`]: field validation errors.
//! - [`model`]: the manifest and its entries.
//! - [`parser`]: JSON decoding of `manifest.json`.

pub mod commit_id;
pub mod digest;
pub mod error;
pub mod model;
pub mod parser;

pub use commit_id::{CommitId, Revision};
pub use digest::{ImageDigest, Sha256Digest};
pub use error::FieldError;
pub use model::{ChartEntry, ImageEntry, Manifest, RepositoryReference};
pub use parser::{MANIFEST_FILE, ManifestParseError, parse_manifest};
