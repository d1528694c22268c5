//! External command execution with a bounded run time.
//!
//! Every collaborator that shells out (`git`, `gpg`, `skopeo`) goes through
//! [`CommandExecutor`], so tests can script command results without touching
//! the host system. The system implementation kills any child that outlives
//! the configured timeout.

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for a single external command (5 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Set to `0` for every child so git fails instead of waiting for
/// credentials on a terminal that nobody is watching.
const GIT_TERMINAL_PROMPT: &str = "GIT_TERMINAL_PROMPT";

/// Errors raised while spawning or supervising an external command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish within the timeout and was killed.
    #[error("{program} timed out after {seconds} seconds")]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// Waiting for the program or collecting its output failed.
    #[error("I/O error while running {program}: {source}")]
    Io {
        /// Program being supervised.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs `program` with `args` and returns the captured output.
    ///
    /// A non-zero exit status is not an error at this layer; callers decide
    /// how to interpret the status.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] when the program cannot be spawned, times
    /// out, or its output cannot be collected.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use syncd::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("git", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), syncd::exec::CommandError>(())
    /// ```
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, CommandError>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Creates an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, CommandError> {
        log::trace!("running {program} {}", args.join(" "));
        let io_error = |source| CommandError::Io {
            program: program.to_owned(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .env(GIT_TERMINAL_PROMPT, "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        // Drain both pipes while waiting so a chatty child cannot block on a
        // full pipe buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let Some(status) = child.wait_timeout(self.timeout).map_err(io_error)? else {
            if let Err(err) = child.kill() {
                log::warn!("failed to kill timed out {program}: {err}");
            }
            if let Err(err) = child.wait() {
                log::warn!("failed to reap timed out {program}: {err}");
            }
            // A grandchild that inherited the pipes can keep them open after
            // the kill, so the reader threads are detached rather than joined.
            drop((stdout, stderr));
            log::debug!("abandoned output readers of timed out {program}");
            return Err(CommandError::TimedOut {
                program: program.to_owned(),
                seconds: self.timeout.as_secs(),
            });
        };

        Ok(Output {
            status,
            stdout: collect(stdout).map_err(io_error)?,
            stderr: collect(stderr).map_err(io_error)?,
        })
    }
}

/// Renders stdout followed by stderr as one trimmed, lossy UTF-8 string.
///
/// Used when reporting tool failures so that diagnostics written to either
/// stream reach the log.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_owned(),
        (out, "") => out.to_owned(),
        (out, err) => format!("{out}\n{err}"),
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| std::io::Error::other("output reader thread panicked"))?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, failure_output};
    use rstest::rstest;

    #[rstest]
    #[case::stdout_only(b"copied".as_slice(), b"".as_slice(), "copied")]
    #[case::stderr_only(b"".as_slice(), b"denied\n".as_slice(), "denied")]
    #[case::both(b"out\n".as_slice(), b"err".as_slice(), "out\nerr")]
    fn combined_output_joins_streams(
        #[case] stdout: &[u8],
        #[case] stderr: &[u8],
        #[case] expected: &str,
    ) {
        let output = Output {
            status: exit_status(1),
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        };
        assert_eq!(combined_output(&output), expected);
    }

    #[test]
    fn combined_output_of_failure_helper_is_stderr() {
        let output = failure_output("manifest unknown");
        assert_eq!(combined_output(&output), "manifest unknown");
    }

    #[test]
    fn default_executor_uses_five_minute_timeout() {
        let executor = SystemCommandExecutor::default();
        assert_eq!(executor.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn timed_out_error_reports_program_and_seconds() {
        let err = CommandError::TimedOut {
            program: "skopeo".to_owned(),
            seconds: 300,
        };
        let msg = err.to_string();
        assert!(msg.contains("skopeo"));
        assert!(msg.contains("300"));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_captures_output_of_real_command() {
        let executor = SystemCommandExecutor::new(Duration::from_secs(10));
        let output = executor
            .run("sh", &["-c", "echo hello; echo oops >&2"])
            .expect("sh runs");
        assert!(output.status.success());
        assert_eq!(combined_output(&output), "hello\noops");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_kills_commands_past_the_timeout() {
        let executor = SystemCommandExecutor::new(Duration::from_millis(100));
        let err = executor
            .run("sleep", &["5"])
            .expect_err("sleep outlives timeout");
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_disables_git_credential_prompts() {
        let executor = SystemCommandExecutor::new(Duration::from_secs(10));
        let output = executor
            .run("sh", &["-c", "printf %s \"$GIT_TERMINAL_PROMPT\""])
            .expect("sh runs");
        assert_eq!(combined_output(&output), "0");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_returns_while_a_grandchild_holds_the_pipes() {
        let executor = SystemCommandExecutor::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = executor
            .run("sh", &["-c", "sleep 5 & sleep 5"])
            .expect_err("shell outlives timeout");
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let executor = SystemCommandExecutor::default();
        let err = executor
            .run("syncd-no-such-program", &[])
            .expect_err("program does not exist");
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
