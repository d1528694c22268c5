//! Synchronisation daemon entrypoint.
//!
//! Parses flags, builds the configuration and the production collaborators,
//! then either runs a single pass (`--once`) or polls forever.

use clap::Parser;
use std::io::Write;
use syncd::cli::Cli;
use syncd::config::SyncConfig;
use syncd::error::DaemonError;
use syncd::exec::SystemCommandExecutor;
use syncd::git::GitClient;
use syncd::logging;
use syncd::mirror::{GitRepositoryMirror, HttpChartClient, SkopeoTransfer};
use syncd::orchestrator::{Collaborators, Synchronizer};
use syncd::resolver::GitManifestResolver;
use syncd::scheduler::{RunSummary, Scheduler, ThreadSleeper};
use syncd::signature::{CommitVerifier, GpgVerifier};

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli) -> Result<(), DaemonError> {
    logging::init(cli.verbosity, cli.quiet)?;
    let config = SyncConfig::from_cli(cli)?;

    let executor = SystemCommandExecutor::new(config.command_timeout);
    let git = GitClient::new(&executor);
    let verifier = config
        .keyring
        .as_ref()
        .map(|keyring| GpgVerifier::new(&executor, keyring));
    let resolver = GitManifestResolver::new(
        git,
        config.manifest_url.as_str(),
        verifier
            .as_ref()
            .map(|verifier| verifier as &dyn CommitVerifier),
    );
    let images = SkopeoTransfer::new(&executor);
    let charts = HttpChartClient::new(config.command_timeout);
    let repository = GitRepositoryMirror::new(git, config.mainline_branch.as_str());

    let mut synchronizer = Synchronizer::new(
        &config,
        Collaborators {
            resolver: &resolver,
            images: &images,
            chart_fetcher: &charts,
            chart_publisher: &charts,
            repository: &repository,
        },
    );

    let scheduler = Scheduler::new(config.sync_interval, &ThreadSleeper);
    if cli.once {
        return once_result(scheduler.run(&mut synchronizer, Some(1)));
    }

    log::info!(
        "polling {} every {}s",
        config.manifest_url,
        config.sync_interval.as_secs()
    );
    scheduler.run(&mut synchronizer, None);
    Ok(())
}

fn once_result(summary: RunSummary) -> Result<(), DaemonError> {
    if summary.failures == 0 {
        Ok(())
    } else {
        Err(DaemonError::PassFailed)
    }
}

fn exit_code_for_run_result(result: Result<(), DaemonError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "syncd: {message}").is_err() {
        // Best-effort reporting; nothing else can be done.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncd::config::ConfigError;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = DaemonError::Config(ConfigError::ZeroDuration {
            setting: "sync-interval",
        });

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert_eq!(stderr_text, "syncd: --sync-interval must be greater than zero\n");
    }

    #[test]
    fn failed_single_pass_exits_with_one() {
        let result = once_result(RunSummary {
            passes: 1,
            failures: 1,
        });

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(result, &mut stderr);
        assert_eq!(exit_code, 1);
        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert_eq!(stderr_text, "syncd: synchronisation pass failed\n");
    }

    #[test]
    fn successful_single_pass_exits_with_zero() {
        let result = once_result(RunSummary {
            passes: 1,
            failures: 0,
        });
        assert!(result.is_ok());
    }
}
