//! CLI argument definitions for the synchronisation daemon.
//!
//! Every setting may also come from a TOML file given with `--config`; flags
//! on the command line take precedence over values from the file. Merging
//! and validation happen in [`crate::config`].

use camino::Utf8PathBuf;
use clap::Parser;

/// Mirror container images, charts and a git repository from a signed
/// manifest.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "syncd")]
#[command(version, about)]
#[command(long_about = concat!(
    "Mirror container images, charts and a git repository from a signed manifest.\n\n",
    "On every tick syncd shallow-clones the manifest repository. When its head commit ",
    "differs from the last successfully synchronised commit, the commit signature is ",
    "checked against the armored keyring, manifest.json is decoded, and every image, ",
    "chart and the satellite repository commit it names are copied from the source ",
    "endpoints to the destination endpoints, in that order.\n\n",
    "A pass stops at the first failure and is retried from scratch on the next tick. ",
    "The checkpoint only advances when every artefact has been mirrored.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Poll every five minutes:\n",
    "    $ syncd --sync-interval 300 \\\n",
    "        --manifest-git-repository https://git.example.com/release/manifest.git \\\n",
    "        --armored-keyring /etc/syncd/release.asc \\\n",
    "        --source-registry registry.example.com --destination-registry mirror.local:5000 \\\n",
    "        --source-chart-repository https://charts.example.com \\\n",
    "        --destination-chart-repository https://charts.mirror.local \\\n",
    "        --source-yggdrasil-git-repository https://git.example.com/yggdrasil.git \\\n",
    "        --destination-yggdrasil-git-repository https://git.mirror.local/yggdrasil.git\n\n",
    "  Run one pass from a configuration file and exit:\n",
    "    $ syncd --config /etc/syncd/syncd.toml --once\n\n",
    "Set RUST_LOG to override the log level chosen by -v/-q.",
))]
pub struct Cli {
    /// TOML file providing default values for the settings below.
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Seconds between the start of consecutive passes [default: 60].
    #[arg(long, value_name = "SECONDS")]
    pub sync_interval: Option<u64>,

    /// Git repository holding manifest.json.
    #[arg(long, value_name = "URL")]
    pub manifest_git_repository: Option<String>,

    /// Armored OpenPGP public keyring trusted to sign manifest commits.
    #[arg(long, value_name = "FILE")]
    pub armored_keyring: Option<Utf8PathBuf>,

    /// Registry images are copied from.
    #[arg(long, value_name = "HOST")]
    pub source_registry: Option<String>,

    /// Registry images are copied to.
    #[arg(long, value_name = "HOST")]
    pub destination_registry: Option<String>,

    /// Chart repository archives are downloaded from.
    #[arg(long, value_name = "URL")]
    pub source_chart_repository: Option<String>,

    /// Chart repository verified archives are uploaded to.
    #[arg(long, value_name = "URL")]
    pub destination_chart_repository: Option<String>,

    /// Git repository the satellite commit is fetched from.
    #[arg(long, value_name = "URL")]
    pub source_yggdrasil_git_repository: Option<String>,

    /// Git repository the satellite commit is force-pushed to.
    #[arg(long, value_name = "URL")]
    pub destination_yggdrasil_git_repository: Option<String>,

    /// Destination branch for the satellite commit [default: master].
    #[arg(long, value_name = "BRANCH")]
    pub mainline_branch: Option<String>,

    /// Seconds before an external command or HTTP request is abandoned
    /// [default: 300].
    #[arg(long, value_name = "SECONDS")]
    pub command_timeout: Option<u64>,

    /// Run a single pass and exit with its status.
    #[arg(long)]
    pub once: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
