//! Installed package versions and the active-version symlinks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_dir as symlink;

use tracing::{debug, warn};

use super::PackageError;
use crate::platform::paths::InstallPaths;

/// Suffix of the file marking a build of `.<version>` as in progress.
const BUILD_MARKER: &str = ".building";

#[derive(Debug, Clone)]
pub struct PackageStore {
  paths: InstallPaths,
}

impl PackageStore {
  pub fn new(paths: InstallPaths) -> Self {
    Self { paths }
  }

  pub fn paths(&self) -> &InstallPaths {
    &self.paths
  }

  /// Whether `version` of `name` has been built.
  pub fn is_installed(&self, name: &str, version: &str) -> bool {
    self.paths.package_version_dir(name, version).is_dir()
  }

  /// Version the `packages/<name>` link currently points at.
  pub fn active_version(&self, name: &str) -> Option<String> {
    let target = fs::read_link(self.paths.package_link(name)).ok()?;
    target.file_name().map(|n| n.to_string_lossy().into_owned())
  }

  /// Create `data/packages` and `packages`.
  pub fn ensure_layout(&self) -> Result<(), PackageError> {
    for dir in [self.paths.data_packages_dir(), self.paths.packages_dir()] {
      fs::create_dir_all(&dir).map_err(PackageError::io(&dir))?;
    }
    Ok(())
  }

  /// Clear `data/packages/<name>/<version>` for a build and return it.
  ///
  /// The build writes straight into its final location so paths a packaging
  /// script records stay valid. A version already there is moved aside until
  /// [`finish_build`](Self::finish_build) or [`abort_build`](Self::abort_build).
  pub fn begin_build(&self, name: &str, version: &str) -> Result<PathBuf, PackageError> {
    let target = self.paths.package_version_dir(name, version);
    let previous = self.previous_dir(name, version);
    let marker = self.marker_path(name, version);
    let parent = self.paths.data_packages_dir().join(name);
    fs::create_dir_all(&parent).map_err(PackageError::io(&parent))?;

    fs::write(&marker, version).map_err(PackageError::io(&marker))?;
    if target.exists() {
      remove_dir_if_exists(&previous)?;
      fs::rename(&target, &previous).map_err(PackageError::io(&previous))?;
    }
    fs::create_dir_all(&target).map_err(PackageError::io(&target))?;

    debug!(package = %name, version = %version, path = ?target, "building in place");
    Ok(target)
  }

  /// Keep the new build and drop the version it replaced.
  pub fn finish_build(&self, name: &str, version: &str) -> Result<(), PackageError> {
    remove_dir_if_exists(&self.previous_dir(name, version))?;
    remove_file_if_exists(&self.marker_path(name, version))
  }

  /// Remove a partial build and put back the version it replaced, if any.
  pub fn abort_build(&self, name: &str, version: &str) -> Result<(), PackageError> {
    let target = self.paths.package_version_dir(name, version);
    let previous = self.previous_dir(name, version);
    remove_dir_if_exists(&target)?;
    if previous.is_dir() {
      fs::rename(&previous, &target).map_err(PackageError::io(&target))?;
    }
    remove_file_if_exists(&self.marker_path(name, version))
  }

  /// Roll back builds of `name` that a previous run left unfinished.
  pub fn recover(&self, name: &str) -> Result<(), PackageError> {
    let dir = self.paths.data_packages_dir().join(name);
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(PackageError::io(&dir)(e)),
    };

    let mut interrupted = Vec::new();
    for entry in entries {
      let entry = entry.map_err(PackageError::io(&dir))?;
      let file_name = entry.file_name();
      if let Some(version) = file_name
        .to_str()
        .and_then(|n| n.strip_prefix('.'))
        .and_then(|n| n.strip_suffix(BUILD_MARKER))
      {
        interrupted.push(version.to_string());
      }
    }

    for version in interrupted {
      warn!(package = %name, version = %version, "rolling back interrupted build");
      self.abort_build(name, &version)?;
    }
    Ok(())
  }

  fn marker_path(&self, name: &str, version: &str) -> PathBuf {
    self.paths.data_packages_dir().join(name).join(format!(".{version}{BUILD_MARKER}"))
  }

  fn previous_dir(&self, name: &str, version: &str) -> PathBuf {
    self.paths.data_packages_dir().join(name).join(format!(".{version}.previous"))
  }

  /// Point `packages/<name>` at `version`, replacing any previous link in one rename.
  pub fn activate(&self, name: &str, version: &str) -> Result<(), PackageError> {
    let link = self.paths.package_link(name);
    let target = self.paths.package_version_dir(name, version);
    let packages_dir = self.paths.packages_dir();
    fs::create_dir_all(&packages_dir).map_err(PackageError::io(&packages_dir))?;

    let temp_link = packages_dir.join(format!(".{name}.{}.link", std::process::id()));
    let _ = fs::remove_file(&temp_link);
    symlink(&target, &temp_link).map_err(PackageError::io(&temp_link))?;

    // A real directory in the way cannot be replaced by rename.
    if let Ok(meta) = fs::symlink_metadata(&link)
      && meta.is_dir()
    {
      fs::remove_dir_all(&link).map_err(PackageError::io(&link))?;
    }

    if let Err(e) = fs::rename(&temp_link, &link) {
      let _ = fs::remove_file(&temp_link);
      return Err(PackageError::io(&link)(e));
    }

    debug!(package = %name, version = %version, "activated package version");
    Ok(())
  }
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<(), PackageError> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(PackageError::io(path)(e)),
  }
}

fn remove_file_if_exists(path: &Path) -> Result<(), PackageError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(PackageError::io(path)(e)),
  }
}
