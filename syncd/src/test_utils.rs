//! Test doubles shared by unit tests and, through the `test-support`
//! feature, by the behaviour suites.

use crate::exec::{CommandError, CommandExecutor};
use crate::git::GitError;
use crate::manifest::{CommitId, Manifest, RepositoryReference};
use crate::mirror::chart::{ChartFetcher, ChartPublisher, FetchError};
use crate::mirror::image::{ImageTransfer, ImageTransferError};
use crate::mirror::repository::RepositoryMirror;
use crate::resolver::{ManifestResolver, Resolution, ResolveError};
use camino::Utf8Path;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{Cursor, Read};
use std::process::{ExitStatus, Output};

/// Argument placeholder that matches any value in an [`ExpectedCall`].
pub const ANY_ARG: &str = "*";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` printing `stdout`.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

type Effect = Box<dyn Fn(&[&str])>;

/// An expected command invocation for [`StubExecutor`].
pub struct ExpectedCall {
    program: &'static str,
    args: Vec<String>,
    result: Result<Output, CommandError>,
    effect: Option<Effect>,
}

impl ExpectedCall {
    /// Expects `program args` and answers with `result`.
    ///
    /// Any argument equal to [`ANY_ARG`] matches whatever the caller passes.
    #[must_use]
    pub fn returning(
        program: &'static str,
        args: &[&str],
        result: Result<Output, CommandError>,
    ) -> Self {
        Self {
            program,
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
            effect: None,
        }
    }

    /// Expects `program args` and answers with a successful, silent exit.
    #[must_use]
    pub fn ok(program: &'static str, args: &[&str]) -> Self {
        Self::returning(program, args, Ok(success_output()))
    }

    /// Runs `effect` with the actual arguments when the call is consumed.
    ///
    /// Lets a stubbed `git clone` populate the checkout directory, for example.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Fn(&[&str]) + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

impl fmt::Debug for ExpectedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedCall")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// A scripted implementation of [`CommandExecutor`].
///
/// Expected invocations are consumed in order; an unexpected or mismatched
/// invocation panics so the failing test points at the offending call.
#[derive(Debug, Default)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Returns every invocation seen so far as `[program, args...]`.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} remain: {remaining:?}",
            remaining.len()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, CommandError> {
        let mut invocation = vec![program.to_owned()];
        invocation.extend(args.iter().map(|arg| (*arg).to_owned()));
        self.calls.borrow_mut().push(invocation);

        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command invocation: {program} {args:?}"));

        assert_eq!(call.program, program);
        assert_eq!(call.args.len(), args.len(), "argument count for {args:?}");
        for (expected, actual) in call.args.iter().zip(args) {
            if expected != ANY_ARG {
                assert_eq!(expected, actual, "argument mismatch in {args:?}");
            }
        }

        if let Some(effect) = &call.effect {
            effect(args);
        }
        call.result
    }
}

/// A manifest source held in memory.
///
/// Behaves like the git-backed resolver: it reports
/// [`Resolution::Unchanged`] while the previous checkpoint matches the
/// current head and hands out the current manifest otherwise.
#[derive(Debug)]
pub struct FakeManifestSource {
    head: RefCell<(CommitId, Manifest)>,
    pending_error: RefCell<Option<ResolveError>>,
    resolutions: Cell<usize>,
}

impl FakeManifestSource {
    /// Creates a source whose head is `commit` carrying `manifest`.
    #[must_use]
    pub fn new(commit: CommitId, manifest: Manifest) -> Self {
        Self {
            head: RefCell::new((commit, manifest)),
            pending_error: RefCell::new(None),
            resolutions: Cell::new(0),
        }
    }

    /// Moves the head to a new commit carrying `manifest`.
    pub fn publish(&self, commit: CommitId, manifest: Manifest) {
        *self.head.borrow_mut() = (commit, manifest);
    }

    /// Makes the next resolution fail with `error`.
    pub fn fail_next(&self, error: ResolveError) {
        *self.pending_error.borrow_mut() = Some(error);
    }

    /// Number of times `resolve` has been called.
    #[must_use]
    pub fn resolutions(&self) -> usize {
        self.resolutions.get()
    }
}

impl ManifestResolver for FakeManifestSource {
    fn resolve(&self, previous: Option<&CommitId>) -> Result<Resolution, ResolveError> {
        self.resolutions.set(self.resolutions.get() + 1);
        if let Some(error) = self.pending_error.borrow_mut().take() {
            return Err(error);
        }
        let (commit, manifest) = &*self.head.borrow();
        if previous == Some(commit) {
            return Ok(Resolution::Unchanged);
        }
        Ok(Resolution::Changed {
            commit: commit.clone(),
            manifest: manifest.clone(),
        })
    }
}

/// Records image copies and optionally fails copies of one source.
#[derive(Debug, Default)]
pub struct RecordingImageTransfer {
    copies: RefCell<Vec<(String, String)>>,
    failing_source: RefCell<Option<String>>,
}

impl RecordingImageTransfer {
    /// Creates a transfer that accepts every copy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes copies whose source address contains `fragment` fail.
    pub fn fail_when_source_contains(&self, fragment: &str) {
        *self.failing_source.borrow_mut() = Some(fragment.to_owned());
    }

    /// Returns the `(source, destination)` pairs copied so far.
    #[must_use]
    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.borrow().clone()
    }
}

impl ImageTransfer for RecordingImageTransfer {
    fn copy(&self, source: &str, destination: &str) -> Result<(), ImageTransferError> {
        self.copies
            .borrow_mut()
            .push((source.to_owned(), destination.to_owned()));
        match &*self.failing_source.borrow() {
            Some(fragment) if source.contains(fragment.as_str()) => Err(ImageTransferError::Failed {
                status: exit_status(1),
                output: format!("reading manifest {source}: manifest unknown"),
            }),
            _ => Ok(()),
        }
    }
}

/// An in-memory chart repository serving and accepting archives by URL.
///
/// Unknown URLs answer with [`FetchError::NotFound`].
#[derive(Debug, Default)]
pub struct InMemoryChartRepository {
    archives: HashMap<String, Vec<u8>>,
    fetched: RefCell<Vec<String>>,
    published: RefCell<Vec<(String, Vec<u8>)>>,
}

impl InMemoryChartRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` at `url`.
    #[must_use]
    pub fn with_archive(mut self, url: &str, body: &[u8]) -> Self {
        self.archives.insert(url.to_owned(), body.to_vec());
        self
    }

    /// URLs fetched so far, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// `(url, body)` pairs published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.borrow().clone()
    }
}

impl ChartFetcher for InMemoryChartRepository {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        self.fetched.borrow_mut().push(url.to_owned());
        self.archives
            .get(url)
            .map(|body| Box::new(Cursor::new(body.clone())) as Box<dyn Read>)
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl ChartPublisher for InMemoryChartRepository {
    fn publish(&self, url: &str, archive: &Utf8Path) -> Result<(), FetchError> {
        let body = std::fs::read(archive)?;
        self.published.borrow_mut().push((url.to_owned(), body));
        Ok(())
    }
}

/// Records repository mirror requests and optionally fails them.
#[derive(Debug, Default)]
pub struct RecordingRepositoryMirror {
    mirrors: RefCell<Vec<(String, String, String)>>,
    failure: RefCell<Option<String>>,
}

impl RecordingRepositoryMirror {
    /// Creates a mirror that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent mirror fail during push with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.borrow_mut() = Some(message.to_owned());
    }

    /// `(source, destination, commit)` triples mirrored so far.
    #[must_use]
    pub fn mirrors(&self) -> Vec<(String, String, String)> {
        self.mirrors.borrow().clone()
    }
}

impl RepositoryMirror for RecordingRepositoryMirror {
    fn mirror(
        &self,
        source: &str,
        destination: &str,
        reference: &RepositoryReference,
    ) -> Result<(), GitError> {
        self.mirrors.borrow_mut().push((
            source.to_owned(),
            destination.to_owned(),
            reference.commit().to_string(),
        ));
        match &*self.failure.borrow() {
            Some(message) => Err(GitError::Failed {
                operation: "push",
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
