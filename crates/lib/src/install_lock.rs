//! Advisory lock on an install root.
//!
//! A mutating run holds an exclusive `flock` on `<root>/.nise-bosh.lock` and
//! records who holds it, so a second run against the same root fails fast
//! and names the run that is in the way.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const LOCK_FILENAME: &str = ".nise-bosh.lock";

/// Who holds an install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub command: String,
  pub install_dir: PathBuf,
  pub started_at_unix: u64,
}

impl LockHolder {
  fn current(command: &str, install_dir: &Path) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      install_dir: install_dir.to_path_buf(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default(),
    }
  }

  fn parse(reader: impl Read) -> Option<Self> {
    serde_json::from_reader(reader).ok()
  }
}

#[derive(Debug, Error)]
pub enum InstallLockError {
  #[error(
    "{} is being installed by `{}` (pid {}).\nRemove {} if that process is gone.",
    holder.install_dir.display(),
    holder.command,
    holder.pid,
    lock_path.display()
  )]
  Held { holder: LockHolder, lock_path: PathBuf },

  #[error("install directory is locked by another run.\nRemove {0} if no run is active.")]
  HeldUnknown(PathBuf),

  #[error("cannot lock {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> InstallLockError + '_ {
  move |source| InstallLockError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Exclusive hold on an install root. Dropping it closes the file and releases the lock.
#[derive(Debug)]
pub struct InstallLock {
  file: File,
  path: PathBuf,
}

impl InstallLock {
  /// Lock `install_dir` for `command`, creating the directory when missing.
  pub fn acquire(install_dir: &Path, command: &str) -> Result<Self, InstallLockError> {
    fs::create_dir_all(install_dir).map_err(io_err(install_dir))?;
    let path = install_dir.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&path)
      .map_err(io_err(&path))?;

    if !try_flock(&file).map_err(io_err(&path))? {
      let err = match File::open(&path).ok().and_then(LockHolder::parse) {
        Some(holder) => InstallLockError::Held {
          holder,
          lock_path: path,
        },
        None => InstallLockError::HeldUnknown(path),
      };
      warn!(error = %err, "install directory busy");
      return Err(err);
    }

    let holder = LockHolder::current(command, install_dir);
    let body = serde_json::to_vec_pretty(&holder).map_err(|e| InstallLockError::Io {
      path: path.clone(),
      source: io::Error::other(e),
    })?;
    file.set_len(0).map_err(io_err(&path))?;
    (&file).write_all(&body).map_err(io_err(&path))?;

    debug!(path = %path.display(), command = %command, "acquired install lock");
    Ok(Self { file, path })
  }

  /// The holder record, read back through the locked handle.
  pub fn holder(&self) -> Option<LockHolder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0)).ok()?;
    LockHolder::parse(file)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// `Ok(false)` when another open file description holds the lock.
#[cfg(unix)]
fn try_flock(file: &File) -> io::Result<bool> {
  use rustix::fs::{FlockOperation, flock};
  use rustix::io::Errno;

  match flock(file, FlockOperation::NonBlockingLockExclusive) {
    Ok(()) => Ok(true),
    Err(e) if e == Errno::WOULDBLOCK => Ok(false),
    Err(e) => Err(e.into()),
  }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> io::Result<bool> {
  Ok(true)
}
