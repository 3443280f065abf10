//! Versioned package installation.
//!
//! A package version is built once into `data/packages/<name>/<version>` and
//! activated by pointing `packages/<name>` at it. The version directory
//! existing is what marks a version as installed.
//!
//! # Submodules
//!
//! - [`store`] - On-disk installation state and symlink activation
//! - [`build`] - Working directory preparation and the packaging script
//! - [`install`] - The idempotent install operation

pub mod build;
pub mod install;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

use crate::release::ReleaseError;

pub use build::BuildOptions;
pub use install::{InstallOutcome, install_package};
pub use store::PackageStore;

#[derive(Debug, Error)]
pub enum PackageError {
  /// The script's stderr is surfaced as-is.
  #[error("{}", stderr.trim_end())]
  PackagingScriptFailure {
    name: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("source file {path} of package {package} does not exist")]
  SourceNotFound { package: String, path: String },

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Release(#[from] ReleaseError),
}

impl PackageError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> PackageError {
    let path = path.into();
    move |source| PackageError::Io { path, source }
  }
}
