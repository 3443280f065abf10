//! Release repository access.
//!
//! A release repository is a BOSH-style source tree:
//!
//! ```text
//! <repo>/
//! ├── dev_releases/index.yml            version index (or releases/index.yml)
//! ├── dev_releases/<name>-<version>.yml release descriptor
//! ├── packages/<name>/{spec,packaging}
//! ├── jobs/<name>/{spec,monit,templates/}
//! └── src/                              package sources
//! ```
//!
//! # Submodules
//!
//! - [`repository`] - Index discovery, version selection and spec loading

pub mod repository;
mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use repository::{ReleaseRepository, SelectedRelease, compare_versions};
pub use types::*;

/// Errors raised while locating or reading a release.
#[derive(Debug, Error)]
pub enum ReleaseError {
  #[error("Release repository does not exist.")]
  RepositoryNotFound(PathBuf),

  #[error("No release index found!\nTry `bosh create release` in your release repository.")]
  IndexMissing(PathBuf),

  #[error("release index {0} lists no versions")]
  IndexEmpty(PathBuf),

  #[error("release file does not exist: {0}")]
  DescriptorNotFound(PathBuf),

  #[error("no release file for version {version} in {dir}")]
  VersionNotFound { version: String, dir: PathBuf },

  #[error("failed to parse {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("required release file is missing: {0}")]
  MissingFile(PathBuf),

  #[error("invalid file mode {mode:?} for template {template} of job {job}")]
  InvalidMode { job: String, template: String, mode: String },

  #[error("package {0} is not part of this release")]
  UnknownPackage(String),

  #[error("job {0} is not part of this release")]
  UnknownJob(String),

  #[error("io error reading {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
