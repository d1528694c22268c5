//! Chart archive mirroring.
//!
//! Each chart is downloaded from the source chart repository as
//! `{chart}-{version}.tgz`, hashed while it is spooled to a temporary file,
//! checked against the manifest digest and only then uploaded to the
//! destination chart repository.

use crate::error::{IntegrityError, TransferError};
use crate::manifest::{ChartEntry, Sha256Digest};
use crate::scratch::ScratchDir;
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Errors raised by chart repository HTTP calls.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request failed or the server answered with an error status.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The archive does not exist (HTTP 404).
    #[error("chart archive not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// Reading or writing the archive body failed.
    #[error("I/O error during transfer: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while mirroring one chart.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// The archive could not be downloaded.
    #[error("cannot fetch chart {chart}: {source}")]
    Fetch {
        /// Chart identity, `name version`.
        chart: String,
        /// Download failure.
        #[source]
        source: FetchError,
    },

    /// The downloaded archive could not be spooled to disk.
    #[error("cannot spool chart {chart}: {source}")]
    Spool {
        /// Chart identity, `name version`.
        chart: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The archive digest differs from the manifest.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The verified archive could not be published.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ChartError {
    /// Returns `true` when the source repository has no such archive.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                source: FetchError::NotFound { .. },
                ..
            }
        )
    }
}

/// Downloads chart archives.
#[cfg_attr(test, mockall::automock)]
pub trait ChartFetcher {
    /// Opens the body of the archive at `url` as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] for a 404 and [`FetchError::Http`]
    /// for any other failure, including any status other than 200.
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError>;
}

/// Uploads chart archives.
#[cfg_attr(test, mockall::automock)]
pub trait ChartPublisher {
    /// Uploads the file at `archive` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the upload is not accepted.
    fn publish(&self, url: &str, archive: &Utf8Path) -> Result<(), FetchError>;
}

/// Chart repository client using `ureq`.
///
/// Downloads with `GET` and uploads with `PUT`, each bounded by a global
/// request timeout.
pub struct HttpChartClient {
    agent: ureq::Agent,
}

impl HttpChartClient {
    /// Creates a client whose requests fail after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ChartFetcher for HttpChartClient {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Http {
                url: url.to_owned(),
                reason: format!("unexpected status {status}"),
            });
        }
        Ok(Box::new(response.into_body().into_reader()))
    }
}

impl ChartPublisher for HttpChartClient {
    fn publish(&self, url: &str, archive: &Utf8Path) -> Result<(), FetchError> {
        let file = File::open(archive)?;
        self.agent
            .put(url)
            .header("Content-Type", "application/gzip")
            .send(file)
            .map_err(|e| map_ureq_error(url, &e))?;
        Ok(())
    }
}

fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Writer that hashes everything passing through it.
struct DigestingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(mut self) -> io::Result<Sha256Digest> {
        self.inner.flush()?;
        Ok(Sha256Digest::from_hasher(self.hasher))
    }
}

impl<W: Write> Write for DigestingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(chunk) = buf.get(..written) {
            self.hasher.update(chunk);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Mirrors chart entries between chart repositories.
pub struct ChartMirror<'a> {
    fetcher: &'a dyn ChartFetcher,
    publisher: &'a dyn ChartPublisher,
}

impl<'a> ChartMirror<'a> {
    /// Creates a mirror downloading through `fetcher` and uploading through
    /// `publisher`.
    #[must_use]
    pub fn new(fetcher: &'a dyn ChartFetcher, publisher: &'a dyn ChartPublisher) -> Self {
        Self { fetcher, publisher }
    }

    /// Downloads `entry` from `source_repository`, verifies its digest and
    /// uploads it to `destination_repository`.
    ///
    /// Without a destination the archive is verified only.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError`] if the download fails, the digest differs or
    /// the upload is rejected. Nothing is uploaded unless the digest matches.
    pub fn mirror(
        &self,
        source_repository: &str,
        destination_repository: Option<&str>,
        entry: &ChartEntry,
    ) -> Result<(), ChartError> {
        let chart = entry.to_string();
        let archive = entry.archive_name();
        let url = format!("{source_repository}/{archive}");
        log::info!("fetching chart {chart} from {url}");

        let mut body = self
            .fetcher
            .fetch(&url)
            .map_err(|source| ChartError::Fetch {
                chart: chart.clone(),
                source,
            })?;

        let spool_error = |source: io::Error| ChartError::Spool {
            chart: chart.clone(),
            source,
        };
        let spool = ScratchDir::new("syncd-chart-").map_err(spool_error)?;
        let spool_path = spool.join("archive.tgz");
        let file = File::create(&spool_path).map_err(spool_error)?;
        let mut writer = DigestingWriter::new(file);
        io::copy(&mut body, &mut writer).map_err(|source| ChartError::Fetch {
            chart: chart.clone(),
            source: FetchError::Io(source),
        })?;
        let actual = writer.finish().map_err(spool_error)?;

        if actual != *entry.digest() {
            return Err(IntegrityError {
                chart,
                expected: entry.digest().to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
        log::debug!("chart {chart} matches digest {actual}");

        let Some(destination) = destination_repository else {
            log::debug!("no destination chart repository configured; skipping publish of {chart}");
            return Ok(());
        };
        let target = format!("{destination}/{archive}");
        log::info!("publishing chart {chart} to {target}");
        self.publisher
            .publish(&target, &spool_path)
            .map_err(|source| TransferError::Chart { chart, source })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "chart_tests.rs"]
mod tests;
