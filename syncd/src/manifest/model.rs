//! Manifest schema types.
//!
//! The manifest lives at the root of the manifest repository as
//! `manifest.json`:
//!
//! ```json
//! {
//!   "charts": [{"chart": "web", "digest": "...", "version": "1.0"}],
//!   "images": [{"digest": "sha256:...", "image": "a", "registry": "r", "tag": "v1"}],
//!   "yggdrasil_repository": {"commit": "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef", "repository": "git://src/y"}
//! }
//! ```
//!
//! Unknown top-level keys are ignored so that the same document can carry
//! data for other tooling.

use super::commit_id::Revision;
use super::digest::{ImageDigest, Sha256Digest};
use serde::Deserialize;
use std::fmt;

/// The desired state for one synchronisation pass.
///
/// # Examples
///
/// ```
/// use syncd::manifest::{ImageEntry, ImageDigest, Manifest, RepositoryReference, Revision};
///
/// let manifest = Manifest::new(
///     vec![ImageEntry::new("r", "a", ImageDigest::try_from("sha256:AAA").expect("digest"), Some("v1"))],
///     Vec::new(),
///     RepositoryReference::new(Revision::try_from("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef").expect("revision"), "git://src/y"),
/// );
/// assert_eq!(manifest.images().len(), 1);
/// assert!(manifest.charts().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    images: Vec<ImageEntry>,
    #[serde(default)]
    charts: Vec<ChartEntry>,
    yggdrasil_repository: RepositoryReference,
}

impl Manifest {
    /// Assembles a manifest from its three sections.
    #[must_use]
    pub fn new(
        images: Vec<ImageEntry>,
        charts: Vec<ChartEntry>,
        yggdrasil_repository: RepositoryReference,
    ) -> Self {
        Self {
            images,
            charts,
            yggdrasil_repository,
        }
    }

    /// Images to mirror, in manifest order.
    #[must_use]
    pub fn images(&self) -> &[ImageEntry] {
        &self.images
    }

    /// Charts to mirror, in manifest order.
    #[must_use]
    pub fn charts(&self) -> &[ChartEntry] {
        &self.charts
    }

    /// The satellite repository commit to mirror.
    #[must_use]
    pub fn repository(&self) -> &RepositoryReference {
        &self.yggdrasil_repository
    }
}

/// One container image, addressed by digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageEntry {
    registry: String,
    image: String,
    digest: ImageDigest,
    #[serde(default)]
    tag: Option<String>,
}

impl ImageEntry {
    /// Creates an entry; an empty `tag` is treated as no tag.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        image: impl Into<String>,
        digest: ImageDigest,
        tag: Option<&str>,
    ) -> Self {
        Self {
            registry: registry.into(),
            image: image.into(),
            digest,
            tag: tag.map(str::to_owned),
        }
    }

    /// Registry namespace, e.g. `docker.io`.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path of the image inside the registry namespace.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Content digest used to pull the image.
    #[must_use]
    pub fn digest(&self) -> &ImageDigest {
        &self.digest
    }

    /// Tag used to name the pushed copy, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref().filter(|tag| !tag.is_empty())
    }
}

impl fmt::Display for ImageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.registry, self.image, self.digest)?;
        if let Some(tag) = self.tag() {
            write!(f, " (tag {tag})")?;
        }
        Ok(())
    }
}

/// One packaged chart with its expected archive digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartEntry {
    chart: String,
    version: String,
    digest: Sha256Digest,
}

impl ChartEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(chart: impl Into<String>, version: impl Into<String>, digest: Sha256Digest) -> Self {
        Self {
            chart: chart.into(),
            version: version.into(),
            digest,
        }
    }

    /// Chart name.
    #[must_use]
    pub fn chart(&self) -> &str {
        &self.chart
    }

    /// Chart semantic version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Expected SHA-256 of the chart archive.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Archive file name in a chart repository: `{chart}-{version}.tgz`.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.chart, self.version)
    }
}

impl fmt::Display for ChartEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.chart, self.version)
    }
}

/// The satellite repository commit mirrored into the destination mainline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryReference {
    commit: Revision,
    #[serde(default)]
    repository: String,
}

impl RepositoryReference {
    /// Creates a reference to `commit`, published upstream at `repository`.
    #[must_use]
    pub fn new(commit: Revision, repository: impl Into<String>) -> Self {
        Self {
            commit,
            repository: repository.into(),
        }
    }

    /// Commit hash or ref to mirror.
    #[must_use]
    pub fn commit(&self) -> &Revision {
        &self.commit
    }

    /// Upstream repository URL recorded in the manifest.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn digest() -> ImageDigest {
        ImageDigest::try_from("sha256:AAA").expect("valid digest")
    }

    #[rstest]
    #[case::absent(None, None)]
    #[case::empty(Some(""), None)]
    #[case::present(Some("v1"), Some("v1"))]
    fn empty_tag_means_no_tag(#[case] tag: Option<&str>, #[case] expected: Option<&str>) {
        let entry = ImageEntry::new("r", "a", digest(), tag);
        assert_eq!(entry.tag(), expected);
    }

    #[test]
    fn image_display_names_coordinates_and_tag() {
        let entry = ImageEntry::new("r", "a", digest(), Some("v1"));
        assert_eq!(entry.to_string(), "r/a@sha256:AAA (tag v1)");
    }

    #[test]
    fn chart_archive_name_joins_name_and_version() {
        let entry = ChartEntry::new("web", "1.0", Sha256Digest::of_bytes(b"chart"));
        assert_eq!(entry.archive_name(), "web-1.0.tgz");
        assert_eq!(entry.to_string(), "web 1.0");
    }
}
