//! Container image mirroring.
//!
//! Images are always pulled by digest. The pushed copy is named by tag when
//! the manifest gives one and by the same digest otherwise.

use crate::error::TransferError;
use crate::exec::{CommandError, CommandExecutor, combined_output};
use crate::manifest::ImageEntry;
use std::process::ExitStatus;

/// Errors raised by an [`ImageTransfer`].
#[derive(Debug, thiserror::Error)]
pub enum ImageTransferError {
    /// The transfer tool ran and exited unsuccessfully.
    #[error("transfer exited with {status}: {output}")]
    Failed {
        /// Exit status of the tool.
        status: ExitStatus,
        /// Combined stdout and stderr of the tool.
        output: String,
    },

    /// The transfer tool could not be run.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Copies an image between two registry addresses.
#[cfg_attr(test, mockall::automock)]
pub trait ImageTransfer {
    /// Copies `source` to `destination`, both given without a transport
    /// prefix (`host/path@digest` or `host/path:tag`).
    ///
    /// # Errors
    ///
    /// Returns [`ImageTransferError`] if the copy does not complete.
    fn copy(&self, source: &str, destination: &str) -> Result<(), ImageTransferError>;
}

/// [`ImageTransfer`] backed by `skopeo copy`.
///
/// All architectures of a multi-arch image are copied and digests are
/// preserved. TLS verification is disabled on both ends.
pub struct SkopeoTransfer<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> SkopeoTransfer<'a> {
    /// Creates a transfer that runs `skopeo` through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }
}

impl ImageTransfer for SkopeoTransfer<'_> {
    fn copy(&self, source: &str, destination: &str) -> Result<(), ImageTransferError> {
        let source_ref = format!("docker://{source}");
        let destination_ref = format!("docker://{destination}");
        let output = self.executor.run(
            "skopeo",
            &[
                "copy",
                "--all",
                "--preserve-digests",
                "--src-tls-verify=false",
                "--dest-tls-verify=false",
                &source_ref,
                &destination_ref,
            ],
        )?;
        if !output.status.success() {
            return Err(ImageTransferError::Failed {
                status: output.status,
                output: combined_output(&output),
            });
        }
        Ok(())
    }
}

/// Source and destination addresses of one image copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAddresses {
    /// Address pulled from: `{src}/{registry}/{image}@{digest}`.
    pub source: String,
    /// Address pushed to: `{dst}/{registry}/{image}:{tag}`, or the digest
    /// coordinates under the destination registry when untagged.
    pub destination: String,
}

impl ImageAddresses {
    /// Computes the addresses for `entry`.
    ///
    /// # Examples
    ///
    /// ```
    /// use syncd::manifest::{ImageDigest, ImageEntry};
    /// use syncd::mirror::ImageAddresses;
    ///
    /// let digest = ImageDigest::try_from("sha256:AAA").expect("digest");
    /// let tagged = ImageEntry::new("r", "a", digest.clone(), Some("v1"));
    /// let addresses = ImageAddresses::for_entry("src.test", "dst.test", &tagged);
    /// assert_eq!(addresses.source, "src.test/r/a@sha256:AAA");
    /// assert_eq!(addresses.destination, "dst.test/r/a:v1");
    ///
    /// let untagged = ImageEntry::new("r", "a", digest, None);
    /// let addresses = ImageAddresses::for_entry("src.test", "dst.test", &untagged);
    /// assert_eq!(addresses.destination, "dst.test/r/a@sha256:AAA");
    /// ```
    #[must_use]
    pub fn for_entry(source_registry: &str, destination_registry: &str, entry: &ImageEntry) -> Self {
        let path = format!("{}/{}", entry.registry(), entry.image());
        let source = format!("{source_registry}/{path}@{}", entry.digest());
        let destination = match entry.tag() {
            Some(tag) => format!("{destination_registry}/{path}:{tag}"),
            None => format!("{destination_registry}/{path}@{}", entry.digest()),
        };
        Self {
            source,
            destination,
        }
    }
}

/// Mirrors image entries through an [`ImageTransfer`].
pub struct ImageMirror<'a> {
    transfer: &'a dyn ImageTransfer,
}

impl<'a> ImageMirror<'a> {
    /// Creates a mirror copying through `transfer`.
    #[must_use]
    pub fn new(transfer: &'a dyn ImageTransfer) -> Self {
        Self { transfer }
    }

    /// Copies `entry` from `source_registry` to `destination_registry`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Image`] naming the entry if the copy fails.
    pub fn mirror(
        &self,
        source_registry: &str,
        destination_registry: &str,
        entry: &ImageEntry,
    ) -> Result<(), TransferError> {
        let addresses = ImageAddresses::for_entry(source_registry, destination_registry, entry);
        log::info!(
            "copying image {} to {}",
            addresses.source,
            addresses.destination
        );
        self.transfer
            .copy(&addresses.source, &addresses.destination)
            .map_err(|source| TransferError::Image {
                image: entry.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ImageDigest;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn entry() -> ImageEntry {
        let digest = ImageDigest::try_from("sha256:AAA").expect("valid digest");
        ImageEntry::new("r", "a", digest, Some("v1"))
    }

    #[rstest]
    fn skopeo_copies_all_architectures_without_tls(entry: ImageEntry) {
        let executor = StubExecutor::new(vec![ExpectedCall::ok(
            "skopeo",
            &[
                "copy",
                "--all",
                "--preserve-digests",
                "--src-tls-verify=false",
                "--dest-tls-verify=false",
                "docker://src.test/r/a@sha256:AAA",
                "docker://dst.test/r/a:v1",
            ],
        )]);
        let transfer = SkopeoTransfer::new(&executor);

        ImageMirror::new(&transfer)
            .mirror("src.test", "dst.test", &entry)
            .expect("copy succeeds");
        executor.assert_finished();
    }

    #[rstest]
    fn skopeo_failure_carries_tool_output(entry: ImageEntry) {
        let executor = StubExecutor::new(vec![ExpectedCall::returning(
            "skopeo",
            &[
                "copy",
                "--all",
                "--preserve-digests",
                "--src-tls-verify=false",
                "--dest-tls-verify=false",
                "docker://src.test/r/a@sha256:AAA",
                "docker://dst.test/r/a:v1",
            ],
            Ok(failure_output("reading manifest sha256:AAA: manifest unknown")),
        )]);
        let transfer = SkopeoTransfer::new(&executor);

        let err = ImageMirror::new(&transfer)
            .mirror("src.test", "dst.test", &entry)
            .expect_err("copy fails");
        let msg = err.to_string();
        assert!(msg.contains("r/a@sha256:AAA"));
        assert!(msg.contains("manifest unknown"));
    }

    #[rstest]
    #[case::tagged(Some("v1"), "dst.test/r/a:v1")]
    #[case::empty_tag(Some(""), "dst.test/r/a@sha256:AAA")]
    #[case::untagged(None, "dst.test/r/a@sha256:AAA")]
    fn destination_uses_tag_or_digest(#[case] tag: Option<&str>, #[case] expected: &str) {
        let digest = ImageDigest::try_from("sha256:AAA").expect("valid digest");
        let entry = ImageEntry::new("r", "a", digest, tag);

        let mut transfer = MockImageTransfer::new();
        transfer
            .expect_copy()
            .with(eq("src.test/r/a@sha256:AAA"), eq(expected.to_owned()))
            .times(1)
            .returning(|_, _| Ok(()));

        ImageMirror::new(&transfer)
            .mirror("src.test", "dst.test", &entry)
            .expect("copy succeeds");
    }
}
