//! Per-pass temporary directories.
//!
//! The manifest clone, the isolated gpg home, the ephemeral mirror
//! repository and chart spool files all live in a [`ScratchDir`], which is
//! removed when the value is dropped at the end of the pass.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tempfile::TempDir;

/// A temporary directory with a UTF-8 path, deleted on drop.
#[derive(Debug)]
pub struct ScratchDir {
    // Held for its `Drop`, which removes the directory.
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl ScratchDir {
    /// Creates a fresh directory under the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or its path
    /// is not valid UTF-8.
    pub fn new(prefix: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("temporary path {} is not UTF-8", path.display()),
            )
        })?;
        Ok(Self { _dir: dir, path })
    }

    /// Root of the directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Path of `name` inside the directory.
    #[must_use]
    pub fn join(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    /// Writes `contents` to `name` inside the directory and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn write(&self, name: &str, contents: &str) -> io::Result<Utf8PathBuf> {
        let path = self.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}
