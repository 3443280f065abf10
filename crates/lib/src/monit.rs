//! Reconciliation of the monit configuration directory.
//!
//! Every rendered job template owns one `<NNNN>_<job>.<template>.monitrc`
//! file in `monit/job/`. A run writes its entries and, unless told to keep
//! them, removes every other `.monitrc` file so monit only watches what was
//! installed last. Files with other extensions are left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::MONIT_EXTENSION;

#[derive(Debug, Error)]
pub enum MonitError {
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> MonitError + '_ {
  move |source| MonitError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// One rendered monit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitEntry {
  /// Manifest job name.
  pub job: String,
  /// Release job (template) name.
  pub template: String,
  /// Position of the template within the manifest job.
  pub position: usize,
  pub contents: String,
}

impl MonitEntry {
  pub fn file_name(&self) -> String {
    format!("{:04}_{}.{}.{MONIT_EXTENSION}", self.position, self.job, self.template)
  }
}

/// What a reconcile changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitReport {
  pub written: Vec<PathBuf>,
  pub pruned: Vec<PathBuf>,
  pub kept: Vec<PathBuf>,
}

/// Write `entries` into `dir` and prune stale `.monitrc` files unless `keep_existing`.
pub fn reconcile(dir: &Path, entries: &[MonitEntry], keep_existing: bool) -> Result<MonitReport, MonitError> {
  fs::create_dir_all(dir).map_err(io_err(dir))?;

  let mut report = MonitReport::default();
  for entry in entries {
    let path = dir.join(entry.file_name());
    fs::write(&path, &entry.contents).map_err(io_err(&path))?;
    debug!(path = ?path, "wrote monit file");
    report.written.push(path);
  }

  let mut stale = Vec::new();
  for dirent in fs::read_dir(dir).map_err(io_err(dir))? {
    let path = dirent.map_err(io_err(dir))?.path();
    let is_monitrc = path.is_file() && path.extension().is_some_and(|ext| ext == MONIT_EXTENSION);
    if is_monitrc && !report.written.contains(&path) {
      stale.push(path);
    }
  }
  stale.sort();

  for path in stale {
    if keep_existing {
      report.kept.push(path);
      continue;
    }
    match fs::remove_file(&path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(io_err(&path)(e)),
    }
    debug!(path = ?path, "removed stale monit file");
    report.pruned.push(path);
  }

  info!(
    written = report.written.len(),
    pruned = report.pruned.len(),
    kept = report.kept.len(),
    "reconciled monit configuration"
  );
  Ok(report)
}
