//! Deployment manifest loading.
//!
//! The manifest assigns each job its index, network and properties. Only the
//! subset of the BOSH manifest format relevant to a single host is read.

mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use types::*;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("deployment manifest does not exist: {0}")]
  NotFound(PathBuf),

  #[error("failed to read deployment manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse deployment manifest {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("Given job does not exist!")]
  JobNotFound(String),
}

impl DeploymentManifest {
  /// Read and parse a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ManifestError::NotFound(path.to_path_buf())),
      Err(source) => {
        return Err(ManifestError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let manifest: DeploymentManifest = serde_yaml::from_str(&content).map_err(|e| ManifestError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    debug!(
      path = %path.display(),
      jobs = manifest.jobs.len(),
      networks = manifest.networks.len(),
      "loaded deployment manifest"
    );
    Ok(manifest)
  }

  /// Look up a job by name.
  pub fn job(&self, name: &str) -> Result<&ManifestJob, ManifestError> {
    self
      .jobs
      .iter()
      .find(|j| j.name == name)
      .ok_or_else(|| ManifestError::JobNotFound(name.to_string()))
  }
}
