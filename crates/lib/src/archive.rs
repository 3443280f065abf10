//! Self-contained job archives.
//!
//! An archive holds everything needed to install one job without the
//! original repository:
//!
//! ```text
//! release.yml   condensed descriptor (used packages and jobs, with fingerprints)
//! release/      packages/<name>/, cached builds or the referenced src/ files,
//!               jobs/<name>/
//! ```
//!
//! Entries are written in sorted order with a fixed owner and mtime, so the
//! same inputs always produce the same tarball.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::{ARCHIVE_DESCRIPTOR, ARCHIVE_RELEASE_DIR, SOURCE_DATE_EPOCH};
use crate::package::build::expand_source_pattern;
use crate::release::{
  DescriptorJob, DescriptorPackage, Release, ReleaseDescriptor, ReleaseError, ReleaseRepository, VersionString,
};
use crate::util::hash::{HashError, hash_paths};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("archive target already exists: {0}")]
  TargetConflict(PathBuf),

  #[error("fingerprint mismatch for {kind} {name}: expected {expected}, got {actual}")]
  FingerprintMismatch {
    kind: &'static str,
    name: String,
    expected: String,
    actual: String,
  },

  #[error("archive {0} does not contain release.yml")]
  MissingDescriptor(PathBuf),

  #[error("failed to serialize archive descriptor: {0}")]
  Serialize(String),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error(transparent)]
  Release(#[from] ReleaseError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
  move |source| ArchiveError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// `<job>_<release>-<version>.tar.gz`
pub fn default_archive_name(job: &str, release: &Release) -> String {
  format!("{job}_{}-{}.tar.gz", release.name, release.version)
}

/// Where an archive is written.
///
/// No target means `cwd`. A directory target gets the default name. Any
/// other path is used verbatim.
pub fn archive_target(target: Option<&Path>, default_name: &str, cwd: &Path) -> PathBuf {
  match target {
    None => cwd.join(default_name),
    Some(dir) if dir.is_dir() => dir.join(default_name),
    Some(path) => path.to_path_buf(),
  }
}

/// Paths (relative to the repository) that make up a package: its directory
/// plus either its cached build or its declared sources.
pub fn package_inputs(release: &Release, name: &str) -> Result<Vec<PathBuf>, ArchiveError> {
  let spec = release.load_package(name)?;
  let src_dir = release.repo_dir.join("src");

  let mut inputs = vec![PathBuf::from("packages").join(name)];
  if let Some(cached) = &spec.cached_build
    && let Ok(relative) = cached.strip_prefix(&release.repo_dir)
  {
    inputs.push(relative.to_path_buf());
    return Ok(inputs);
  }
  for pattern in &spec.files {
    inputs.extend(
      expand_source_pattern(&src_dir, pattern)
        .into_iter()
        .map(|p| PathBuf::from("src").join(p)),
    );
  }
  Ok(inputs)
}

/// Write an archive of `jobs` and `packages` of `release` to `target`.
///
/// `packages` should already be the dependency closure of the jobs. Fails
/// with [`ArchiveError::TargetConflict`] instead of replacing an existing file.
pub fn build_archive(
  release: &Release,
  jobs: &[String],
  packages: &[String],
  target: &Path,
) -> Result<PathBuf, ArchiveError> {
  if fs::symlink_metadata(target).is_ok() {
    return Err(ArchiveError::TargetConflict(target.to_path_buf()));
  }

  let mut inputs: Vec<PathBuf> = Vec::new();
  let mut descriptor_packages = Vec::with_capacity(packages.len());
  for name in packages {
    let entry = release
      .packages
      .get(name)
      .ok_or_else(|| ReleaseError::UnknownPackage(name.clone()))?;
    let package_paths = package_inputs(release, name)?;
    let fingerprint = hash_paths(&release.repo_dir, &package_paths)?;
    inputs.extend(package_paths);

    descriptor_packages.push(DescriptorPackage {
      name: name.clone(),
      version: VersionString::Text(entry.version.clone()),
      dependencies: entry.dependencies.iter().filter(|d| packages.contains(*d)).cloned().collect(),
      fingerprint: Some(fingerprint.0),
    });
  }

  let mut descriptor_jobs = Vec::with_capacity(jobs.len());
  for name in jobs {
    let entry = release
      .jobs
      .get(name)
      .ok_or_else(|| ReleaseError::UnknownJob(name.clone()))?;
    let job_path = PathBuf::from("jobs").join(name);
    let fingerprint = hash_paths(&release.repo_dir, std::slice::from_ref(&job_path))?;
    inputs.push(job_path);

    descriptor_jobs.push(DescriptorJob {
      name: name.clone(),
      version: VersionString::Text(entry.version.clone()),
      fingerprint: Some(fingerprint.0),
    });
  }

  let descriptor = ReleaseDescriptor {
    name: release.name.clone(),
    version: VersionString::Text(release.version.clone()),
    packages: descriptor_packages,
    jobs: descriptor_jobs,
  };
  let descriptor_yaml = serde_yaml::to_string(&descriptor).map_err(|e| ArchiveError::Serialize(e.to_string()))?;

  let entries = collect_entries(&release.repo_dir, &inputs)?;

  let parent = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err(parent))?;

  {
    let encoder = GzEncoder::new(BufWriter::new(temp.as_file()), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    append_bytes(&mut builder, ARCHIVE_DESCRIPTOR, descriptor_yaml.as_bytes(), 0o644)?;
    append_dir(&mut builder, ARCHIVE_RELEASE_DIR)?;
    for relative in &entries {
      append_entry(&mut builder, &release.repo_dir, relative)?;
    }

    let encoder = builder.into_inner().map_err(io_err(target))?;
    let mut writer = encoder.finish().map_err(io_err(target))?;
    writer.flush().map_err(io_err(target))?;
  }

  temp.persist_noclobber(target).map_err(|e| {
    if e.error.kind() == io::ErrorKind::AlreadyExists {
      ArchiveError::TargetConflict(target.to_path_buf())
    } else {
      io_err(target)(e.error)
    }
  })?;

  info!(
    path = %target.display(),
    packages = packages.len(),
    jobs = jobs.len(),
    entries = entries.len(),
    "wrote job archive"
  );
  Ok(target.to_path_buf())
}

/// Every file, directory and symlink under `inputs`, sorted and unique.
fn collect_entries(root: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ArchiveError> {
  let mut entries: Vec<PathBuf> = Vec::new();

  for input in inputs {
    // Parent directories of a selected source file.
    let mut ancestor = input.parent();
    while let Some(dir) = ancestor.filter(|d| !d.as_os_str().is_empty()) {
      entries.push(dir.to_path_buf());
      ancestor = dir.parent();
    }

    for entry in WalkDir::new(root.join(input)).sort_by_file_name() {
      let entry = entry.map_err(|e| ArchiveError::Io {
        path: root.join(input),
        source: e.into(),
      })?;
      if let Ok(relative) = entry.path().strip_prefix(root) {
        entries.push(relative.to_path_buf());
      }
    }
  }

  entries.sort();
  entries.dedup();
  Ok(entries)
}

fn base_header(entry_type: EntryType, mode: u32, size: u64) -> Header {
  let mut header = Header::new_gnu();
  header.set_entry_type(entry_type);
  header.set_mode(mode);
  header.set_size(size);
  header.set_mtime(SOURCE_DATE_EPOCH);
  header.set_uid(0);
  header.set_gid(0);
  header
}

fn append_bytes<W: Write>(builder: &mut Builder<W>, path: &str, data: &[u8], mode: u32) -> Result<(), ArchiveError> {
  let mut header = base_header(EntryType::Regular, mode, data.len() as u64);
  builder
    .append_data(&mut header, path, data)
    .map_err(io_err(Path::new(path)))
}

fn append_dir<W: Write>(builder: &mut Builder<W>, path: &str) -> Result<(), ArchiveError> {
  let mut header = base_header(EntryType::Directory, 0o755, 0);
  builder
    .append_data(&mut header, format!("{path}/"), io::empty())
    .map_err(io_err(Path::new(path)))
}

fn append_entry<W: Write>(builder: &mut Builder<W>, root: &Path, relative: &Path) -> Result<(), ArchiveError> {
  let source = root.join(relative);
  let archive_path = Path::new(ARCHIVE_RELEASE_DIR).join(relative);
  let meta = fs::symlink_metadata(&source).map_err(io_err(&source))?;

  if meta.is_dir() {
    return append_dir(builder, &archive_path.to_string_lossy());
  }

  if meta.file_type().is_symlink() {
    let link = fs::read_link(&source).map_err(io_err(&source))?;
    let mut header = base_header(EntryType::Symlink, 0o777, 0);
    return builder
      .append_link(&mut header, &archive_path, &link)
      .map_err(io_err(&source));
  }

  let mut header = base_header(EntryType::Regular, file_mode(&meta), meta.len());
  let file = File::open(&source).map_err(io_err(&source))?;
  builder
    .append_data(&mut header, &archive_path, BufReader::new(file))
    .map_err(io_err(&source))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  if meta.permissions().mode() & 0o111 != 0 { 0o755 } else { 0o644 }
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
  0o644
}

/// Locations of an extracted archive, ready to install from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredArchive {
  /// The extracted `release.yml`.
  pub descriptor: PathBuf,
  /// The extracted `release/` directory, usable as a release repository.
  pub release_dir: PathBuf,
}

/// Extract `archive` into `dest` and check every recorded fingerprint.
pub fn restore_archive(archive: &Path, dest: &Path) -> Result<RestoredArchive, ArchiveError> {
  fs::create_dir_all(dest).map_err(io_err(dest))?;

  let file = File::open(archive).map_err(io_err(archive))?;
  let mut tarball = Archive::new(GzDecoder::new(BufReader::new(file)));
  tarball.unpack(dest).map_err(io_err(archive))?;

  let descriptor = dest.join(ARCHIVE_DESCRIPTOR);
  let release_dir = dest.join(ARCHIVE_RELEASE_DIR);
  if !descriptor.is_file() {
    return Err(ArchiveError::MissingDescriptor(archive.to_path_buf()));
  }
  fs::create_dir_all(&release_dir).map_err(io_err(&release_dir))?;

  let repo = ReleaseRepository::open(&release_dir, Some(descriptor.clone()))?;
  let release = repo.load(&repo.select(None)?)?;
  verify_fingerprints(&release)?;

  debug!(archive = %archive.display(), dest = %dest.display(), "restored job archive");
  Ok(RestoredArchive {
    descriptor,
    release_dir,
  })
}

/// Recompute the fingerprint of every package and job that records one.
pub fn verify_fingerprints(release: &Release) -> Result<(), ArchiveError> {
  for (name, entry) in &release.packages {
    if let Some(expected) = &entry.fingerprint {
      let actual = hash_paths(&release.repo_dir, &package_inputs(release, name)?)?;
      check("package", name, expected, &actual.0)?;
    }
  }
  for (name, entry) in &release.jobs {
    if let Some(expected) = &entry.fingerprint {
      let actual = hash_paths(&release.repo_dir, &[PathBuf::from("jobs").join(name)])?;
      check("job", name, expected, &actual.0)?;
    }
  }
  Ok(())
}

fn check(kind: &'static str, name: &str, expected: &str, actual: &str) -> Result<(), ArchiveError> {
  if expected == actual {
    return Ok(());
  }
  Err(ArchiveError::FingerprintMismatch {
    kind,
    name: name.to_string(),
    expected: expected.to_string(),
    actual: actual.to_string(),
  })
}
