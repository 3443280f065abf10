//! Working directory preparation and packaging script execution.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::PackageError;
use super::store::remove_dir_if_exists;
use crate::consts::{PACKAGING_SCRIPT, SOURCE_DATE_EPOCH};
use crate::release::PackageSpec;

/// How packaging scripts are run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Parent of the per-package compile directories.
  pub working_dir: PathBuf,
  /// Interpreter invoked as `<shell> -e packaging`.
  pub shell: String,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      working_dir: crate::platform::paths::default_working_dir(),
      shell: "bash".to_string(),
    }
  }
}

impl BuildOptions {
  pub fn compile_dir(&self, package: &str) -> PathBuf {
    self.working_dir.join("packages").join(package)
  }
}

/// Fresh compile directory holding the package directory and its sources.
///
/// A cached build tarball replaces both: its contents are unpacked as-is and
/// its own packaging script is kept when it carries one.
pub fn prepare_compile_dir(spec: &PackageSpec, repo_dir: &Path, compile_dir: &Path) -> Result<(), PackageError> {
  remove_dir_if_exists(compile_dir)?;
  fs::create_dir_all(compile_dir).map_err(PackageError::io(compile_dir))?;

  if let Some(tarball) = &spec.cached_build {
    unpack_cached_build(tarball, compile_dir)?;
    let script = compile_dir.join(PACKAGING_SCRIPT);
    if !script.is_file() {
      fs::write(&script, &spec.packaging).map_err(PackageError::io(&script))?;
    }
    debug!(package = %spec.name, tarball = ?tarball, "prepared compile directory from cached build");
    return Ok(());
  }

  copy_tree(&spec.dir, compile_dir)?;
  fs::write(compile_dir.join(PACKAGING_SCRIPT), &spec.packaging).map_err(PackageError::io(compile_dir))?;

  let src_dir = repo_dir.join("src");
  for pattern in &spec.files {
    let matches = expand_source_pattern(&src_dir, pattern);
    if matches.is_empty() {
      return Err(PackageError::SourceNotFound {
        package: spec.name.clone(),
        path: pattern.clone(),
      });
    }
    for relative in matches {
      let from = src_dir.join(&relative);
      let to = compile_dir.join(&relative);
      if from.is_dir() {
        copy_tree(&from, &to)?;
      } else {
        copy_file(&from, &to)?;
      }
    }
  }

  debug!(package = %spec.name, path = ?compile_dir, "prepared compile directory");
  Ok(())
}

/// Source paths (relative to `src/`) selected by one `files` entry.
///
/// Supports exact paths, a trailing `/*` or `/**/*` for a whole directory, and
/// `*` wildcards within the last path component.
pub fn expand_source_pattern(src_dir: &Path, pattern: &str) -> Vec<PathBuf> {
  let pattern = pattern.trim_start_matches("./");

  for suffix in ["/**/*", "/*"] {
    if let Some(dir) = pattern.strip_suffix(suffix)
      && !dir.contains('*')
    {
      return if src_dir.join(dir).is_dir() {
        vec![PathBuf::from(dir)]
      } else {
        Vec::new()
      };
    }
  }

  let path = Path::new(pattern);
  let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  if !file_name.contains('*') {
    return if src_dir.join(path).exists() {
      vec![path.to_path_buf()]
    } else {
      Vec::new()
    };
  }

  let parent = path.parent().unwrap_or(Path::new(""));
  let Ok(entries) = fs::read_dir(src_dir.join(parent)) else {
    return Vec::new();
  };
  let mut matches: Vec<PathBuf> = entries
    .filter_map(Result::ok)
    .filter(|e| wildcard_match(&file_name, &e.file_name().to_string_lossy()))
    .map(|e| parent.join(e.file_name()))
    .collect();
  matches.sort();
  matches
}

fn unpack_cached_build(tarball: &Path, compile_dir: &Path) -> Result<(), PackageError> {
  let file = File::open(tarball).map_err(PackageError::io(tarball))?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
  archive.unpack(compile_dir).map_err(PackageError::io(tarball))
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
  let mut parts = pattern.split('*');
  let first = parts.next().unwrap_or_default();
  let Some(mut rest) = name.strip_prefix(first) else {
    return false;
  };
  let parts: Vec<&str> = parts.collect();
  for (i, part) in parts.iter().enumerate() {
    if i + 1 == parts.len() {
      return rest.ends_with(part);
    }
    match rest.find(part) {
      Some(pos) => rest = &rest[pos + part.len()..],
      None => return false,
    }
  }
  rest.is_empty()
}

fn copy_file(from: &Path, to: &Path) -> Result<(), PackageError> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent).map_err(PackageError::io(parent))?;
  }
  fs::copy(from, to).map_err(PackageError::io(from))?;
  Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), PackageError> {
  for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
    let entry = entry.map_err(|e| PackageError::Io {
      path: from.to_path_buf(),
      source: e.into(),
    })?;
    let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let target = to.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(PackageError::io(&target))?;
    } else if file_type.is_symlink() {
      #[cfg(unix)]
      {
        let link = fs::read_link(entry.path()).map_err(PackageError::io(entry.path()))?;
        let _ = fs::remove_file(&target);
        std::os::unix::fs::symlink(link, &target).map_err(PackageError::io(&target))?;
      }
    } else {
      copy_file(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Environment handed to a packaging script.
#[derive(Debug, Clone)]
pub struct PackagingEnv {
  pub install_target: PathBuf,
  pub compile_target: PathBuf,
  pub packages_dir: PathBuf,
}

/// Run `<shell> -e packaging` inside the compile directory.
///
/// The script inherits the caller's environment plus the `BOSH_*` variables.
/// A non-zero exit or a failure to launch the shell is reported as
/// [`PackageError::PackagingScriptFailure`] with the script's stderr.
pub async fn run_packaging_script(
  spec: &PackageSpec,
  env: &PackagingEnv,
  options: &BuildOptions,
) -> Result<(), PackageError> {
  info!(package = %spec.name, version = %spec.version, "running packaging script");

  let mut command = Command::new(&options.shell);
  command
    .arg("-e")
    .arg(PACKAGING_SCRIPT)
    .current_dir(&env.compile_target)
    .env("BOSH_INSTALL_TARGET", &env.install_target)
    .env("BOSH_COMPILE_TARGET", &env.compile_target)
    .env("BOSH_PACKAGE_NAME", &spec.name)
    .env("BOSH_PACKAGE_VERSION", &spec.version)
    .env("BOSH_PACKAGES_DIR", &env.packages_dir)
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH.to_string())
    .stdin(Stdio::null());

  debug!(shell = %options.shell, working_dir = ?env.compile_target, "spawning packaging script");

  let output = command.output().await.map_err(|e| PackageError::PackagingScriptFailure {
    name: spec.name.clone(),
    code: None,
    stderr: format!("failed to launch {}: {e}", options.shell),
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !stdout.is_empty() {
    debug!(package = %spec.name, stdout = %stdout.trim_end(), "packaging script output");
  }

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(package = %spec.name, code = ?output.status.code(), stderr = %stderr, "packaging script failed");
    return Err(PackageError::PackagingScriptFailure {
      name: spec.name.clone(),
      code: output.status.code(),
      stderr,
    });
  }

  Ok(())
}
