use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Release index: `dev_releases/index.yml` or `releases/index.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseIndex {
  #[serde(default)]
  pub builds: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
  pub version: VersionString,
}

/// Versions appear both quoted and bare in the wild (`version: 2`).
///
/// A bare `2.10` is read by YAML as the float `2.1`; quote such versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionString {
  Text(String),
  Integer(u64),
  Float(f64),
}

impl VersionString {
  pub fn as_string(&self) -> String {
    match self {
      VersionString::Text(s) => s.clone(),
      VersionString::Integer(n) => n.to_string(),
      VersionString::Float(f) => f.to_string(),
    }
  }
}

/// A release descriptor (`<name>-<version>.yml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
  pub name: String,
  pub version: VersionString,
  #[serde(default)]
  pub packages: Vec<DescriptorPackage>,
  #[serde(default)]
  pub jobs: Vec<DescriptorJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorPackage {
  pub name: String,
  pub version: VersionString,
  #[serde(default)]
  pub dependencies: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorJob {
  pub name: String,
  pub version: VersionString,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fingerprint: Option<String>,
}

/// `packages/<name>/spec`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PackageSpecFile {
  #[serde(default)]
  pub files: Vec<String>,
}

/// `jobs/<name>/spec`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct JobSpecFile {
  #[serde(default)]
  pub templates: BTreeMap<String, TemplateTarget>,
  #[serde(default)]
  pub packages: Vec<String>,
  #[serde(default)]
  pub properties: BTreeMap<String, PropertyDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum TemplateTarget {
  Destination(String),
  Detailed {
    destination: String,
    #[serde(default)]
    mode: Option<ModeValue>,
  },
}

/// File mode written either as an octal string (`"0750"`) or as bare digits (`750`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ModeValue {
  Text(String),
  Integer(u32),
}

impl ModeValue {
  pub fn to_mode(&self) -> Option<u32> {
    match self {
      ModeValue::Text(s) => {
        let digits = s.trim().trim_start_matches("0o");
        u32::from_str_radix(digits, 8).ok()
      }
      ModeValue::Integer(n) => Some(u32::from_str_radix(&n.to_string(), 8).unwrap_or(*n)),
    }
  }
}

/// A job property declaration with an optional default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyDefinition {
  #[serde(default)]
  pub default: Option<serde_yaml::Value>,
  #[serde(default)]
  pub description: Option<String>,
}

/// A loaded release: descriptor metadata plus the repository it came from.
///
/// Package and job specs are loaded on demand, so a broken job does not
/// prevent installing unrelated packages.
#[derive(Debug, Clone)]
pub struct Release {
  pub name: String,
  pub version: String,
  pub descriptor_path: PathBuf,
  pub repo_dir: PathBuf,
  pub packages: BTreeMap<String, PackageEntry>,
  pub jobs: BTreeMap<String, JobEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
  pub name: String,
  pub version: String,
  pub dependencies: Vec<String>,
  pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
  pub name: String,
  pub version: String,
  pub fingerprint: Option<String>,
}

/// Everything needed to build one package version.
#[derive(Debug, Clone)]
pub struct PackageSpec {
  pub name: String,
  pub version: String,
  pub dependencies: Vec<String>,
  /// Contents of the packaging script.
  pub packaging: String,
  /// Source paths relative to the repository's `src/` directory.
  pub files: Vec<String>,
  /// `packages/<name>/` in the repository.
  pub dir: PathBuf,
  /// Cached build tarball of this version, used instead of `src/` when present.
  pub cached_build: Option<PathBuf>,
}

/// One template file of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
  /// Path relative to `jobs/<name>/templates/`.
  pub source: String,
  /// Path relative to the rendered job directory.
  pub destination: String,
  pub mode: u32,
  pub contents: String,
}

/// Everything needed to render one job.
#[derive(Debug, Clone)]
pub struct JobSpec {
  pub name: String,
  pub version: String,
  pub templates: Vec<TemplateFile>,
  pub monit: String,
  pub packages: Vec<String>,
  pub properties: BTreeMap<String, PropertyDefinition>,
  /// `jobs/<name>/` in the repository.
  pub dir: PathBuf,
}

/// Default mode for a rendered file: executables live under `bin/`.
pub fn default_mode(destination: &str) -> u32 {
  if Path::new(destination).starts_with("bin") { 0o750 } else { 0o644 }
}
