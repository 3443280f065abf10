//! Progress events emitted by the engine.
//!
//! The library never prints. Front ends implement [`Reporter`] to turn
//! events into user output; the `Display` impl carries the canonical wording.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
  PackageSkipped { name: &'a str, version: &'a str },
  PackageBuilding { name: &'a str, version: &'a str },
  PackageInstalled { name: &'a str, version: &'a str },
  JobRendered { job: &'a str, files: usize },
  MonitReconciled { written: usize, pruned: usize },
  ArchiveWritten { path: &'a Path },
}

impl fmt::Display for Event<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Event::PackageSkipped { .. } => write!(f, "The same version of the package is already installed. Skipping"),
      Event::PackageBuilding { name, .. } => write!(f, "Running the packaging script for {name}"),
      Event::PackageInstalled { name, version } => write!(f, "Installed package {name} ({version})"),
      Event::JobRendered { job, files } => write!(f, "Rendered job {job} ({files} files)"),
      Event::MonitReconciled { written, pruned } => {
        write!(f, "Monit configuration updated ({written} written, {pruned} removed)")
      }
      Event::ArchiveWritten { path } => write!(f, "Archive created: {}", path.display()),
    }
  }
}

pub trait Reporter {
  fn report(&self, event: &Event<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
  fn report(&self, _event: &Event<'_>) {}
}
