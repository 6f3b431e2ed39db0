//! Detaching from the terminal and pid file bookkeeping.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors while daemonizing.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),

    #[error("Can't create pid file {}: {source}", .path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which side of the fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// The invoking process; it should exit successfully.
    Parent,
    /// The background process, now a session leader rooted at `/`.
    Child,
}

/// Fork into the background.
///
/// Must be called before any threads are started. In the child the process
/// becomes a session leader, changes directory to `/` and clears its umask.
pub fn detach() -> Result<Detached, DaemonError> {
    // SAFETY: the process is still single-threaded at this point.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(DaemonError::Fork(io::Error::last_os_error()));
    }
    if pid != 0 {
        return Ok(Detached::Parent);
    }

    // SAFETY: plain syscalls without pointer arguments.
    unsafe {
        libc::setsid();
        libc::umask(0);
    }
    if let Err(e) = std::env::set_current_dir("/") {
        debug!("Failed to change directory to /: {}", e);
    }

    Ok(Detached::Child)
}

/// A pid file created by this process.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id, as decimal text and a newline, to `path`.
    pub fn create(path: &Path) -> Result<Self, DaemonError> {
        fs::write(path, format!("{}\n", std::process::id())).map_err(|source| {
            DaemonError::PidFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!("Wrote pid file {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(&self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}
