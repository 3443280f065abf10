//! Install-root layout and default directory resolution.
//!
//! Everything the engine mutates lives under a single install root:
//!
//! ```text
//! <root>/
//! ├── packages/<name>                  -> data/packages/<name>/<version>
//! ├── data/packages/<name>/<version>/  package contents
//! ├── jobs/<job>/                      rendered templates
//! └── monit/job/                       one .monitrc per job template
//! ```

use std::path::PathBuf;

use crate::consts::{DEFAULT_INSTALL_DIR, DEFAULT_WORKING_DIR, INSTALL_DIR_ENV, WORKING_DIR_ENV};

/// Returns the install root, honouring `NISE_BOSH_INSTALL_DIR`.
pub fn default_install_dir() -> PathBuf {
  std::env::var(INSTALL_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from(DEFAULT_INSTALL_DIR))
}

/// Returns the compile working directory, honouring `NISE_BOSH_WORKING_DIR`.
pub fn default_working_dir() -> PathBuf {
  std::env::var(WORKING_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from(DEFAULT_WORKING_DIR))
}

/// Resolved directory layout of one install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
  root: PathBuf,
}

impl InstallPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Directory holding the activation symlinks.
  pub fn packages_dir(&self) -> PathBuf {
    self.root.join("packages")
  }

  /// Directory holding every installed package version.
  pub fn data_packages_dir(&self) -> PathBuf {
    self.root.join("data").join("packages")
  }

  pub fn package_link(&self, name: &str) -> PathBuf {
    self.packages_dir().join(name)
  }

  pub fn package_version_dir(&self, name: &str, version: &str) -> PathBuf {
    self.data_packages_dir().join(name).join(version)
  }

  pub fn jobs_dir(&self) -> PathBuf {
    self.root.join("jobs")
  }

  pub fn monit_dir(&self) -> PathBuf {
    self.root.join("monit").join("job")
  }
}
