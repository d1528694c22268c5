//! Tests for daemon CLI parsing.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["syncd"]);
    assert!(cli.config.is_none());
    assert!(cli.sync_interval.is_none());
    assert!(cli.manifest_git_repository.is_none());
    assert!(cli.armored_keyring.is_none());
    assert!(cli.destination_chart_repository.is_none());
    assert!(cli.mainline_branch.is_none());
    assert!(cli.command_timeout.is_none());
    assert!(!cli.once);
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[test]
fn cli_parses_daemon_flags() {
    let cli = Cli::parse_from([
        "syncd",
        "--sync-interval",
        "30",
        "--manifest-git-repository",
        "https://git.example.test/manifest.git",
        "--armored-keyring",
        "/etc/syncd/release.asc",
        "--source-registry",
        "registry.src.test",
        "--destination-registry",
        "registry.dst.test",
        "--source-chart-repository",
        "https://charts.src.test",
        "--destination-chart-repository",
        "https://charts.dst.test",
        "--source-yggdrasil-git-repository",
        "https://git.src.test/y.git",
        "--destination-yggdrasil-git-repository",
        "https://git.dst.test/y.git",
    ]);
    assert_eq!(cli.sync_interval, Some(30));
    assert_eq!(
        cli.manifest_git_repository.as_deref(),
        Some("https://git.example.test/manifest.git")
    );
    assert_eq!(
        cli.armored_keyring,
        Some(Utf8PathBuf::from("/etc/syncd/release.asc"))
    );
    assert_eq!(cli.source_registry.as_deref(), Some("registry.src.test"));
    assert_eq!(cli.destination_registry.as_deref(), Some("registry.dst.test"));
    assert_eq!(
        cli.destination_yggdrasil_git_repository.as_deref(),
        Some("https://git.dst.test/y.git")
    );
}

#[test]
fn cli_parses_once_and_config() {
    let cli = Cli::parse_from(["syncd", "--config", "/etc/syncd/syncd.toml", "--once"]);
    assert!(cli.once);
    assert_eq!(cli.config, Some(Utf8PathBuf::from("/etc/syncd/syncd.toml")));
}

#[rstest]
#[case::single(&["syncd", "-v"], 1)]
#[case::double(&["syncd", "-vv"], 2)]
#[case::long(&["syncd", "--verbose", "--verbose"], 2)]
fn cli_counts_verbosity(#[case] args: &[&str], #[case] expected: u8) {
    let cli = Cli::parse_from(args);
    assert_eq!(cli.verbosity, expected);
}

#[test]
fn cli_rejects_verbose_with_quiet() {
    let result = Cli::try_parse_from(["syncd", "-v", "-q"]);
    assert!(result.is_err());
}

#[test]
fn cli_rejects_non_numeric_interval() {
    let result = Cli::try_parse_from(["syncd", "--sync-interval", "soon"]);
    assert!(result.is_err());
}
