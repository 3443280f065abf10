//! Content fingerprints for release inputs.
//!
//! - `hash_paths()`: deterministic hash over selected files and directories
//! - `hash_file()`: single file hashing

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A full 64-character SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to read symlink {path}: {message}")]
  ReadSymlink { path: String, message: String },

  #[error("path to hash does not exist: {0}")]
  Missing(PathBuf),
}

/// Hash the files and directories at `relative` paths under `root`.
///
/// Directories are walked recursively. The hash covers relative paths, file
/// contents and symlink targets, never timestamps or permissions, so the
/// same tree hashes identically wherever it is extracted.
pub fn hash_paths(root: &Path, relative: &[PathBuf]) -> Result<ContentHash, HashError> {
  let mut entries: Vec<(String, String)> = Vec::new();

  for start in relative {
    let start_path = root.join(start);
    if fs::symlink_metadata(&start_path).is_err() {
      return Err(HashError::Missing(start_path));
    }

    for entry in WalkDir::new(&start_path).sort_by_file_name() {
      let entry = entry.map_err(|e| HashError::WalkDir { message: e.to_string() })?;
      let entry_path = entry.path();

      let rel_path = entry_path
        .strip_prefix(root)
        .unwrap_or(entry_path)
        .to_string_lossy()
        .replace('\\', "/");

      let file_type = entry.file_type();
      let entry_hash = if file_type.is_file() {
        format!("F:{}:{}", rel_path, hash_file(entry_path)?.0)
      } else if file_type.is_dir() {
        format!("D:{}", rel_path)
      } else if file_type.is_symlink() {
        let target = fs::read_link(entry_path).map_err(|e| HashError::ReadSymlink {
          path: entry_path.display().to_string(),
          message: e.to_string(),
        })?;
        format!("L:{}:{}", rel_path, target.to_string_lossy())
      } else {
        continue;
      };

      entries.push((rel_path, entry_hash));
    }
  }

  entries.sort();
  entries.dedup();

  let mut hasher = Sha256::new();
  for (_, entry_hash) in entries {
    hasher.update(entry_hash.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |e: std::io::Error| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };
  let mut file = fs::File::open(path).map_err(read_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}
