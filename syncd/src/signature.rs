//! Manifest commit authentication.
//!
//! A [`Keyring`] is loaded once at startup from an armored OpenPGP public
//! key file. Each pass splits the manifest head commit into its signed
//! payload and detached `gpgsig` signature, then asks a [`CommitVerifier`]
//! to check the signature. [`GpgVerifier`] runs `gpg` against a throwaway
//! home directory so the host keyrings are never consulted or modified.

use crate::exec::{CommandExecutor, combined_output};
use crate::manifest::CommitId;
use crate::scratch::ScratchDir;
use camino::Utf8Path;

const ARMORED_PUBLIC_KEY_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const SIGNATURE_HEADERS: [&str; 2] = ["gpgsig", "gpgsig-sha256"];
const VALID_SIGNATURE_STATUS: &str = "[GNUPG:] VALIDSIG ";

/// Errors raised while loading the keyring.
#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    /// The keyring file could not be read.
    #[error("cannot read keyring {path}: {source}")]
    Read {
        /// Path of the keyring file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file does not contain an armored public key block.
    #[error("keyring {path} does not contain an armored public key block")]
    NotArmored {
        /// Path of the keyring file.
        path: String,
    },
}

/// Errors raised when a manifest commit fails authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticityError {
    /// The commit carries no detached signature.
    #[error("commit {commit} isn't signed")]
    Unsigned {
        /// The unsigned commit.
        commit: CommitId,
    },

    /// The signature does not verify against the keyring.
    #[error("signature on commit {commit} did not verify: {message}")]
    InvalidSignature {
        /// The commit whose signature failed.
        commit: CommitId,
        /// Verifier output describing the failure.
        message: String,
    },

    /// The verifier could not be prepared or run.
    #[error("signature verification could not run: {message}")]
    Verifier {
        /// Description of the failure.
        message: String,
    },
}

/// An armored OpenPGP public keyring, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    armored: String,
}

impl Keyring {
    /// Reads and checks the armored keyring at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError`] if the file is unreadable or not armored.
    pub fn load(path: &Utf8Path) -> Result<Self, KeyringError> {
        let armored = std::fs::read_to_string(path).map_err(|source| KeyringError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_armored(armored).ok_or_else(|| KeyringError::NotArmored {
            path: path.to_string(),
        })
    }

    /// Wraps already loaded armored text, if it holds a public key block.
    #[must_use]
    pub fn from_armored(armored: String) -> Option<Self> {
        armored
            .contains(ARMORED_PUBLIC_KEY_HEADER)
            .then_some(Self { armored })
    }

    /// The armored key material.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.armored
    }
}

/// A raw commit object separated into signed payload and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCommit {
    /// The commit object with its signature header removed.
    pub payload: String,
    /// The armored detached signature.
    pub signature: String,
}

/// Splits a raw commit object (`git cat-file commit`) into payload and
/// signature.
///
/// Returns `None` when the commit has no `gpgsig` header.
///
/// # Examples
///
/// ```
/// use syncd::signature::split_signed_commit;
///
/// let raw = concat!(
///     "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n",
///     "gpgsig -----BEGIN PGP SIGNATURE-----\n",
///     " \n",
///     " iQEz\n",
///     " -----END PGP SIGNATURE-----\n",
///     "\n",
///     "bump manifest\n",
/// );
/// let signed = split_signed_commit(raw).expect("signed commit");
/// assert_eq!(
///     signed.payload,
///     "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\nbump manifest\n"
/// );
/// assert!(signed.signature.starts_with("-----BEGIN PGP SIGNATURE-----\n\niQEz\n"));
/// ```
#[must_use]
pub fn split_signed_commit(raw: &str) -> Option<SignedCommit> {
    let mut payload = String::with_capacity(raw.len());
    let mut signature: Option<String> = None;
    let mut in_signature = false;
    let mut in_headers = true;

    for line in raw.split_inclusive('\n') {
        if !in_headers {
            payload.push_str(line);
            continue;
        }
        if in_signature {
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some(sig) = signature.as_mut() {
                    sig.push_str(continuation);
                }
                continue;
            }
            in_signature = false;
        }
        if line == "\n" {
            in_headers = false;
            payload.push_str(line);
            continue;
        }
        if let Some(value) = signature_header_value(line) {
            in_signature = true;
            if signature.is_none() {
                signature = Some(value.to_owned());
            }
            continue;
        }
        payload.push_str(line);
    }

    signature.map(|signature| SignedCommit { payload, signature })
}

fn signature_header_value(line: &str) -> Option<&str> {
    let (name, value) = line.split_once(' ')?;
    SIGNATURE_HEADERS.contains(&name).then_some(value)
}

/// Checks that a commit was signed by a trusted key.
#[cfg_attr(test, mockall::automock)]
pub trait CommitVerifier {
    /// Verifies the signature embedded in `raw_commit`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticityError::Unsigned`] when there is no signature and
    /// [`AuthenticityError::InvalidSignature`] when it does not verify.
    fn verify(&self, commit: &CommitId, raw_commit: &str) -> Result<(), AuthenticityError>;
}

/// Verifies commit signatures with `gpg` in an isolated home directory.
pub struct GpgVerifier<'a> {
    executor: &'a dyn CommandExecutor,
    keyring: &'a Keyring,
}

impl<'a> GpgVerifier<'a> {
    /// Creates a verifier trusting exactly the keys in `keyring`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, keyring: &'a Keyring) -> Self {
        Self { executor, keyring }
    }

    fn run_gpg(&self, home: &Utf8Path, args: &[&str]) -> Result<std::process::Output, AuthenticityError> {
        let mut full_args = vec!["--batch", "--no-tty", "--homedir", home.as_str()];
        full_args.extend_from_slice(args);
        self.executor
            .run("gpg", &full_args)
            .map_err(|err| AuthenticityError::Verifier {
                message: err.to_string(),
            })
    }
}

impl CommitVerifier for GpgVerifier<'_> {
    fn verify(&self, commit: &CommitId, raw_commit: &str) -> Result<(), AuthenticityError> {
        let signed = split_signed_commit(raw_commit).ok_or_else(|| AuthenticityError::Unsigned {
            commit: commit.clone(),
        })?;

        let scratch_error = |err: std::io::Error| AuthenticityError::Verifier {
            message: format!("cannot prepare gpg home: {err}"),
        };
        let home = ScratchDir::new("syncd-gpg-").map_err(scratch_error)?;
        let keyring_path = home.write("keyring.asc", self.keyring.as_str()).map_err(scratch_error)?;
        let signature_path = home.write("commit.sig", &signed.signature).map_err(scratch_error)?;
        let payload_path = home.write("commit.payload", &signed.payload).map_err(scratch_error)?;

        let import = self.run_gpg(home.path(), &["--quiet", "--import", keyring_path.as_str()])?;
        if !import.status.success() {
            return Err(AuthenticityError::Verifier {
                message: format!("keyring import failed: {}", combined_output(&import)),
            });
        }

        let verify = self.run_gpg(
            home.path(),
            &[
                "--status-fd",
                "1",
                "--verify",
                signature_path.as_str(),
                payload_path.as_str(),
            ],
        )?;
        let stdout = String::from_utf8_lossy(&verify.stdout);
        let valid = stdout
            .lines()
            .any(|line| line.starts_with(VALID_SIGNATURE_STATUS));
        if !verify.status.success() || !valid {
            return Err(AuthenticityError::InvalidSignature {
                commit: commit.clone(),
                message: combined_output(&verify),
            });
        }

        log::debug!("commit {} carries a valid signature", commit.short());
        Ok(())
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
