//! Release index discovery, version selection and spec loading.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::consts::{MONIT_TEMPLATE, PACKAGING_SCRIPT, SPEC_FILE};

use super::types::{
  JobEntry, JobSpec, JobSpecFile, PackageEntry, PackageSpec, PackageSpecFile, Release, ReleaseDescriptor,
  ReleaseIndex, TemplateFile, TemplateTarget, default_mode,
};
use super::ReleaseError;

/// Index locations, in order of preference.
const INDEX_DIRS: &[&str] = &["dev_releases", "releases"];
const INDEX_FILE: &str = "index.yml";

/// Build caches holding `packages/<name>/<version>.tgz`, in order of preference.
const BUILD_CACHE_DIRS: &[&str] = &[".final_builds", ".dev_builds"];

/// `config/dev.yml` / `config/final.yml`, used to disambiguate descriptor names.
#[derive(Debug, Default, Deserialize)]
struct ReleaseConfig {
  #[serde(default)]
  dev_name: Option<String>,
  #[serde(default)]
  final_name: Option<String>,
  #[serde(default)]
  name: Option<String>,
}

/// The descriptor chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRelease {
  pub descriptor_path: PathBuf,
  pub version: String,
}

/// A release repository on disk, optionally with an explicit descriptor file.
#[derive(Debug, Clone)]
pub struct ReleaseRepository {
  dir: PathBuf,
  release_file: Option<PathBuf>,
}

impl ReleaseRepository {
  /// Open a repository.
  ///
  /// When `release_file` is given it is used as the descriptor verbatim and
  /// the index is never consulted.
  pub fn open(dir: impl Into<PathBuf>, release_file: Option<PathBuf>) -> Result<Self, ReleaseError> {
    let dir = dir.into();
    if !dir.is_dir() {
      return Err(ReleaseError::RepositoryNotFound(dir));
    }
    Ok(Self { dir, release_file })
  }

  /// Path of the release index, if the repository has one.
  pub fn index_path(&self) -> Option<PathBuf> {
    INDEX_DIRS
      .iter()
      .map(|d| self.dir.join(d).join(INDEX_FILE))
      .find(|p| p.is_file())
  }

  /// Select the descriptor for `version`, or the latest indexed version.
  pub fn select(&self, version: Option<&str>) -> Result<SelectedRelease, ReleaseError> {
    if let Some(path) = &self.release_file {
      if !path.is_file() {
        return Err(ReleaseError::DescriptorNotFound(path.clone()));
      }
      let descriptor: ReleaseDescriptor = read_yaml(path)?;
      debug!(path = %path.display(), "using explicit release file");
      return Ok(SelectedRelease {
        descriptor_path: path.clone(),
        version: descriptor.version.as_string(),
      });
    }

    let index_path = self
      .index_path()
      .ok_or_else(|| ReleaseError::IndexMissing(self.dir.clone()))?;
    let index: ReleaseIndex = read_yaml(&index_path)?;
    let versions: Vec<String> = index.builds.values().map(|e| e.version.as_string()).collect();

    let version = match version {
      Some(wanted) => {
        if !versions.iter().any(|v| v == wanted) {
          return Err(ReleaseError::VersionNotFound {
            version: wanted.to_string(),
            dir: index_path.clone(),
          });
        }
        wanted.to_string()
      }
      None => versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
        .ok_or_else(|| ReleaseError::IndexEmpty(index_path.clone()))?,
    };

    let index_dir = index_path.parent().unwrap_or(&self.dir);
    let descriptor_path = self.find_descriptor(index_dir, &version)?;

    info!(version = %version, path = %descriptor_path.display(), "selected release");
    Ok(SelectedRelease {
      descriptor_path,
      version,
    })
  }

  /// Load the selected descriptor.
  pub fn load(&self, selected: &SelectedRelease) -> Result<Release, ReleaseError> {
    let descriptor: ReleaseDescriptor = read_yaml(&selected.descriptor_path)?;

    let packages: BTreeMap<String, PackageEntry> = descriptor
      .packages
      .into_iter()
      .map(|p| {
        let entry = PackageEntry {
          name: p.name.clone(),
          version: p.version.as_string(),
          dependencies: p.dependencies,
          fingerprint: p.fingerprint,
        };
        (p.name, entry)
      })
      .collect();

    let jobs: BTreeMap<String, JobEntry> = descriptor
      .jobs
      .into_iter()
      .map(|j| {
        let entry = JobEntry {
          name: j.name.clone(),
          version: j.version.as_string(),
          fingerprint: j.fingerprint,
        };
        (j.name, entry)
      })
      .collect();

    debug!(
      name = %descriptor.name,
      packages = packages.len(),
      jobs = jobs.len(),
      "loaded release descriptor"
    );

    Ok(Release {
      name: descriptor.name,
      version: descriptor.version.as_string(),
      descriptor_path: selected.descriptor_path.clone(),
      repo_dir: self.dir.clone(),
      packages,
      jobs,
    })
  }

  fn configured_name(&self) -> Option<String> {
    ["dev.yml", "final.yml"].iter().find_map(|file| {
      let path = self.dir.join("config").join(file);
      if !path.is_file() {
        return None;
      }
      let config: ReleaseConfig = read_yaml(&path).ok()?;
      config.dev_name.or(config.final_name).or(config.name)
    })
  }

  fn find_descriptor(&self, index_dir: &Path, version: &str) -> Result<PathBuf, ReleaseError> {
    let suffix = format!("-{version}.yml");
    let read_dir = fs::read_dir(index_dir).map_err(|source| ReleaseError::Io {
      path: index_dir.to_path_buf(),
      source,
    })?;

    let mut candidates: Vec<String> = read_dir
      .filter_map(Result::ok)
      .filter_map(|e| e.file_name().to_str().map(str::to_string))
      .filter(|name| name.ends_with(&suffix) && name.len() > suffix.len())
      .collect();
    candidates.sort();

    if let Some(name) = self.configured_name() {
      let preferred = format!("{name}{suffix}");
      if candidates.contains(&preferred) {
        return Ok(index_dir.join(preferred));
      }
    }

    match candidates.as_slice() {
      [] => Err(ReleaseError::VersionNotFound {
        version: version.to_string(),
        dir: index_dir.to_path_buf(),
      }),
      [only] => Ok(index_dir.join(only)),
      [first, ..] => {
        warn!(version = %version, candidates = ?candidates, "several release files match, using the first");
        Ok(index_dir.join(first))
      }
    }
  }
}

impl Release {
  /// Load a package's spec and packaging script from the repository.
  pub fn load_package(&self, name: &str) -> Result<PackageSpec, ReleaseError> {
    let entry = self
      .packages
      .get(name)
      .ok_or_else(|| ReleaseError::UnknownPackage(name.to_string()))?;

    let dir = self.repo_dir.join("packages").join(name);
    let packaging = read_required(&dir.join(PACKAGING_SCRIPT))?;

    let spec_path = dir.join(SPEC_FILE);
    let spec: PackageSpecFile = if spec_path.is_file() {
      read_yaml(&spec_path)?
    } else {
      PackageSpecFile::default()
    };

    let cached_build = self.cached_build(name, &entry.version);
    if let Some(path) = &cached_build {
      debug!(package = %name, version = %entry.version, path = %path.display(), "found cached build");
    }

    Ok(PackageSpec {
      name: entry.name.clone(),
      version: entry.version.clone(),
      dependencies: entry.dependencies.clone(),
      packaging,
      files: spec.files,
      dir,
      cached_build,
    })
  }

  /// Tarball of `name` at `version` from the repository's build caches.
  pub fn cached_build(&self, name: &str, version: &str) -> Option<PathBuf> {
    BUILD_CACHE_DIRS
      .iter()
      .map(|d| {
        self
          .repo_dir
          .join(d)
          .join("packages")
          .join(name)
          .join(format!("{version}.tgz"))
      })
      .find(|p| p.is_file())
  }

  /// Load a job's spec, templates and monit template from the repository.
  pub fn load_job(&self, name: &str) -> Result<JobSpec, ReleaseError> {
    let entry = self
      .jobs
      .get(name)
      .ok_or_else(|| ReleaseError::UnknownJob(name.to_string()))?;

    let dir = self.repo_dir.join("jobs").join(name);
    let spec_path = dir.join(SPEC_FILE);
    if !spec_path.is_file() {
      return Err(ReleaseError::MissingFile(spec_path));
    }
    let spec: JobSpecFile = read_yaml(&spec_path)?;
    let monit = read_required(&dir.join(MONIT_TEMPLATE))?;

    let templates_dir = dir.join("templates");
    let mut templates = Vec::with_capacity(spec.templates.len());
    for (source, target) in spec.templates {
      let (destination, mode) = match target {
        TemplateTarget::Destination(destination) => {
          let mode = default_mode(&destination);
          (destination, mode)
        }
        TemplateTarget::Detailed { destination, mode } => {
          let mode = match mode {
            Some(value) => value.to_mode().ok_or_else(|| ReleaseError::InvalidMode {
              job: name.to_string(),
              template: source.clone(),
              mode: format!("{value:?}"),
            })?,
            None => default_mode(&destination),
          };
          (destination, mode)
        }
      };

      let contents = read_required(&templates_dir.join(&source))?;
      templates.push(TemplateFile {
        source,
        destination,
        mode,
        contents,
      });
    }

    Ok(JobSpec {
      name: entry.name.clone(),
      version: entry.version.clone(),
      templates,
      monit,
      packages: spec.packages,
      properties: spec.properties,
      dir,
    })
  }
}

/// Compare release versions component-wise.
///
/// Numeric components compare numerically (`10 > 9`), others lexically; when
/// one version is a prefix of the other the longer one wins (`2.1-dev > 2.1`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
  let split = |s: &str| -> Vec<String> {
    s.split(|c: char| c == '.' || c == '-' || c == '+')
      .filter(|p| !p.is_empty())
      .map(str::to_string)
      .collect()
  };
  let (left, right) = (split(a), split(b));

  for (l, r) in left.iter().zip(right.iter()) {
    let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
      (Ok(l), Ok(r)) => l.cmp(&r),
      (Ok(_), Err(_)) => Ordering::Greater,
      (Err(_), Ok(_)) => Ordering::Less,
      (Err(_), Err(_)) => l.cmp(r),
    };
    if ordering != Ordering::Equal {
      return ordering;
    }
  }

  left.len().cmp(&right.len())
}

fn read_required(path: &Path) -> Result<String, ReleaseError> {
  fs::read_to_string(path).map_err(|source| {
    if source.kind() == io::ErrorKind::NotFound {
      ReleaseError::MissingFile(path.to_path_buf())
    } else {
      ReleaseError::Io {
        path: path.to_path_buf(),
        source,
      }
    }
  })
}

pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ReleaseError> {
  let content = read_required(path)?;
  serde_yaml::from_str(&content).map_err(|e| ReleaseError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  })
}
