//! Daemon configuration.
//!
//! [`SyncConfig`] is assembled once at startup from the command line and an
//! optional TOML file, validated, and then only ever borrowed. The keyring
//! named by the configuration is loaded here so that an unreadable key is a
//! startup error rather than a failure on every pass.

use crate::cli::Cli;
use crate::exec::DEFAULT_COMMAND_TIMEOUT;
use crate::mirror::repository::DEFAULT_MAINLINE_BRANCH;
use crate::signature::{Keyring, KeyringError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Default number of seconds between the start of consecutive passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised while building the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting was given neither on the command line nor in the
    /// configuration file.
    #[error("missing required setting --{setting}")]
    Missing {
        /// Flag name of the setting.
        setting: &'static str,
    },

    /// A duration setting was zero.
    #[error("--{setting} must be greater than zero")]
    ZeroDuration {
        /// Flag name of the setting.
        setting: &'static str,
    },

    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    ReadFile {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration file {path}: {source}")]
    ParseFile {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// TOML decoding error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// The keyring could not be loaded.
    #[error(transparent)]
    Keyring(#[from] KeyringError),
}

/// Settings read from a `--config` TOML file.
///
/// Keys mirror the long flag names in snake case.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Seconds between passes.
    pub sync_interval: Option<u64>,
    /// Manifest repository URL.
    pub manifest_git_repository: Option<String>,
    /// Armored keyring path.
    pub armored_keyring: Option<Utf8PathBuf>,
    /// Source image registry.
    pub source_registry: Option<String>,
    /// Destination image registry.
    pub destination_registry: Option<String>,
    /// Source chart repository.
    pub source_chart_repository: Option<String>,
    /// Destination chart repository.
    pub destination_chart_repository: Option<String>,
    /// Source satellite repository.
    pub source_yggdrasil_git_repository: Option<String>,
    /// Destination satellite repository.
    pub destination_yggdrasil_git_repository: Option<String>,
    /// Destination branch for the satellite commit.
    pub mainline_branch: Option<String>,
    /// Seconds before an external command is abandoned.
    pub command_timeout: Option<u64>,
}

impl FileConfig {
    /// Reads and decodes the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] or [`ConfigError::ParseFile`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.to_owned(),
            source: Box::new(source),
        })
    }
}

/// A source and destination base URL for one artefact class.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointPair {
    /// Where artefacts are read from.
    pub source: String,
    /// Where artefacts are written to.
    pub destination: String,
}

/// Chart repository endpoints; publishing is skipped without a destination.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChartEndpoints {
    /// Repository archives are downloaded from.
    pub source: String,
    /// Repository verified archives are uploaded to.
    pub destination: Option<String>,
}

/// Validated daemon configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Manifest repository URL.
    pub manifest_url: String,
    /// Keyring trusted to sign manifest commits; `None` disables the check.
    pub keyring: Option<Keyring>,
    /// Image registries.
    pub registry: EndpointPair,
    /// Chart repositories.
    pub charts: ChartEndpoints,
    /// Satellite git repositories.
    pub repository: EndpointPair,
    /// Destination branch for the satellite commit.
    pub mainline_branch: String,
    /// Time between the start of consecutive passes.
    pub sync_interval: Duration,
    /// Limit for each external command and HTTP request.
    pub command_timeout: Duration,
}

impl SyncConfig {
    /// Builds the configuration from parsed flags, reading `--config` when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file or keyring cannot be read or a
    /// setting is missing or invalid.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = cli
            .config
            .as_deref()
            .map(FileConfig::load)
            .transpose()?
            .unwrap_or_default();
        Self::from_sources(cli, file)
    }

    /// Merges flags over `file` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the keyring cannot be read or a setting is
    /// missing or invalid.
    pub fn from_sources(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let keyring = cli
            .armored_keyring
            .clone()
            .or(file.armored_keyring)
            .map(|path| Keyring::load(&path))
            .transpose()?;
        if keyring.is_none() {
            log::warn!("no --armored-keyring configured; manifest signatures will not be checked");
        }

        Ok(Self {
            manifest_url: endpoint(
                "manifest-git-repository",
                cli.manifest_git_repository.clone().or(file.manifest_git_repository),
            )?,
            keyring,
            registry: EndpointPair {
                source: endpoint(
                    "source-registry",
                    cli.source_registry.clone().or(file.source_registry),
                )?,
                destination: endpoint(
                    "destination-registry",
                    cli.destination_registry.clone().or(file.destination_registry),
                )?,
            },
            charts: ChartEndpoints {
                source: endpoint(
                    "source-chart-repository",
                    cli.source_chart_repository.clone().or(file.source_chart_repository),
                )?,
                destination: cli
                    .destination_chart_repository
                    .clone()
                    .or(file.destination_chart_repository)
                    .map(|value| trim_endpoint(&value))
                    .filter(|value| !value.is_empty()),
            },
            repository: EndpointPair {
                source: endpoint(
                    "source-yggdrasil-git-repository",
                    cli.source_yggdrasil_git_repository
                        .clone()
                        .or(file.source_yggdrasil_git_repository),
                )?,
                destination: endpoint(
                    "destination-yggdrasil-git-repository",
                    cli.destination_yggdrasil_git_repository
                        .clone()
                        .or(file.destination_yggdrasil_git_repository),
                )?,
            },
            mainline_branch: cli
                .mainline_branch
                .clone()
                .or(file.mainline_branch)
                .unwrap_or_else(|| DEFAULT_MAINLINE_BRANCH.to_owned()),
            sync_interval: seconds(
                "sync-interval",
                cli.sync_interval.or(file.sync_interval),
                DEFAULT_SYNC_INTERVAL,
            )?,
            command_timeout: seconds(
                "command-timeout",
                cli.command_timeout.or(file.command_timeout),
                DEFAULT_COMMAND_TIMEOUT,
            )?,
        })
    }
}

fn trim_endpoint(value: &str) -> String {
    value.trim().trim_end_matches('/').to_owned()
}

fn endpoint(setting: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|raw| trim_endpoint(&raw))
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or(ConfigError::Missing { setting })
}

fn seconds(
    setting: &'static str,
    value: Option<u64>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroDuration { setting }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
