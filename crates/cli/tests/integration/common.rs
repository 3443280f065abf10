//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file or directory.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// The release repository fixture.
pub fn release_dir() -> PathBuf {
  fixture_path("release")
}

/// A deployment manifest fixture.
pub fn manifest(name: &str) -> PathBuf {
  fixture_path("manifests").join(name)
}

/// Read a file below `root`.
pub fn contents(root: &Path, relative: &str) -> String {
  let path = root.join(relative);
  std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

/// Recursively copy a fixture tree.
pub fn copy_dir(from: &Path, to: &Path) {
  std::fs::create_dir_all(to).unwrap();
  for entry in std::fs::read_dir(from).unwrap() {
    let entry = entry.unwrap();
    let target = to.join(entry.file_name());
    if entry.file_type().unwrap().is_dir() {
      copy_dir(&entry.path(), &target);
    } else {
      std::fs::copy(entry.path(), &target).unwrap();
    }
  }
}

/// Isolated test environment.
///
/// Each test gets its own temporary install and working directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Install root (not created up front).
  pub fn install_dir(&self) -> PathBuf {
    self.temp.path().join("vcap")
  }

  /// Package compilation directory.
  pub fn working_dir(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  /// Scratch directory for archives and extraction.
  pub fn scratch_dir(&self) -> PathBuf {
    let p = self.temp.path().join("scratch");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Read a file below the install root.
  pub fn installed(&self, relative: &str) -> String {
    contents(&self.install_dir(), relative)
  }

  /// Get a Command for the nise-bosh binary with isolated directories.
  ///
  /// Both the `-d`/`--working-dir` flags and the environment overrides are
  /// set, so a test that drops the flags still stays inside its temp dir.
  pub fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("nise-bosh");
    cmd.env("NISE_BOSH_INSTALL_DIR", self.install_dir());
    cmd.env("NISE_BOSH_WORKING_DIR", self.working_dir());
    cmd.env_remove("RUST_LOG");
    cmd.arg("-d").arg(self.install_dir());
    cmd.arg("--working-dir").arg(self.working_dir());
    cmd
  }

  /// `cmd()` for the default job mode with `-y`.
  pub fn install_job(&self, manifest_name: &str, job: &str) -> Command {
    let mut cmd = self.cmd();
    cmd.arg("-y").arg(release_dir()).arg(manifest(manifest_name)).arg(job);
    cmd
  }
}
