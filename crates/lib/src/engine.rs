//! Run modes: job install, template-only render, packages, archive and show.
//!
//! Every mode is split into a read-only plan and an execution step. Planning
//! loads the release and manifest and resolves dependencies, so configuration
//! errors surface before anything on disk changes.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::archive::{self, ArchiveError};
use crate::install_lock::{InstallLock, InstallLockError};
use crate::manifest::{DeploymentManifest, ManifestError, ManifestJob};
use crate::monit::{self, MonitEntry, MonitError, MonitReport};
use crate::package::{BuildOptions, InstallOutcome, PackageError, PackageStore, install_package};
use crate::platform::paths::{InstallPaths, default_install_dir, default_working_dir};
use crate::platform::host_ip;
use crate::release::{Release, ReleaseError, ReleaseRepository, SelectedRelease};
use crate::report::{Event, Reporter};
use crate::resolve::{self, ResolveError};
use crate::template::{BindingContext, BindingOverrides, RenderedJob, TemplateError, render_job};

/// Everything that can stop a run.
#[derive(Debug, Error)]
pub enum RunError {
  #[error("Arguments number error!")]
  Arguments,

  #[error(transparent)]
  Release(#[from] ReleaseError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error(transparent)]
  Monit(#[from] MonitError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error(transparent)]
  Lock(#[from] InstallLockError),
}

/// Options shared by every run mode.
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub install_dir: PathBuf,
  pub working_dir: PathBuf,
  /// Release descriptor to use instead of consulting the index.
  pub release_file: Option<PathBuf>,
  pub force: bool,
  pub template_only: bool,
  pub index: Option<u32>,
  pub ip: Option<String>,
  /// Resolve dependencies transitively.
  pub transitive: bool,
  pub keep_monit_files: bool,
  /// Interpreter for packaging scripts.
  pub shell: String,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      install_dir: default_install_dir(),
      working_dir: default_working_dir(),
      release_file: None,
      force: false,
      template_only: false,
      index: None,
      ip: None,
      transitive: true,
      keep_monit_files: false,
      shell: "bash".to_string(),
    }
  }
}

impl RunOptions {
  /// Layout of the install root. A relative root is anchored at the current
  /// directory, since packaging scripts and links record these paths.
  pub fn paths(&self) -> InstallPaths {
    InstallPaths::new(anchored(&self.install_dir))
  }

  fn build_options(&self) -> BuildOptions {
    BuildOptions {
      working_dir: anchored(&self.working_dir),
      shell: self.shell.clone(),
    }
  }

  fn overrides(&self) -> BindingOverrides {
    BindingOverrides {
      index: self.index,
      ip: self.ip.clone(),
    }
  }
}

fn anchored(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolved work for one manifest job.
#[derive(Debug, Clone)]
pub struct JobPlan {
  pub release: Release,
  pub manifest: DeploymentManifest,
  pub job: ManifestJob,
  /// Release jobs rendered for the manifest job, in order.
  pub templates: Vec<String>,
  /// Packages to install, dependencies first.
  pub packages: Vec<String>,
}

/// Resolved work for an explicit package list.
#[derive(Debug, Clone)]
pub struct PackagesPlan {
  pub release: Release,
  pub packages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PackageReport {
  pub name: String,
  pub version: String,
  pub outcome: InstallOutcome,
}

#[derive(Debug, Clone)]
pub struct JobReport {
  pub packages: Vec<PackageReport>,
  pub rendered: Vec<RenderedJob>,
  pub monit: MonitReport,
}

fn load_release(repo_dir: &Path, release_file: Option<&Path>, version: Option<&str>) -> Result<Release, RunError> {
  let repo = ReleaseRepository::open(repo_dir, release_file.map(Path::to_path_buf))?;
  let selected = repo.select(version)?;
  Ok(repo.load(&selected)?)
}

/// Load and resolve everything needed to install `job_name` from `manifest_path`.
pub fn plan_job(
  repo_dir: &Path,
  manifest_path: &Path,
  job_name: &str,
  options: &RunOptions,
) -> Result<JobPlan, RunError> {
  let repo = ReleaseRepository::open(repo_dir, options.release_file.clone())?;
  let manifest = DeploymentManifest::load(manifest_path)?;
  let version = manifest.release_version();
  let release = repo.load(&repo.select(version.as_deref())?)?;

  let job = manifest.job(job_name)?.clone();
  let templates = job.template_names();
  let packages = resolve::job_packages(&release, &templates, options.transitive)?;

  info!(
    job = %job_name,
    release = %release.name,
    version = %release.version,
    templates = ?templates,
    packages = ?packages,
    "planned job install"
  );

  Ok(JobPlan {
    release,
    manifest,
    job,
    templates,
    packages,
  })
}

/// Resolve an explicit package list against the selected release.
pub fn plan_packages(repo_dir: &Path, names: &[String], options: &RunOptions) -> Result<PackagesPlan, RunError> {
  let release = load_release(repo_dir, options.release_file.as_deref(), None)?;
  let packages = resolve::packages(&release, names, options.transitive)?;
  info!(release = %release.name, version = %release.version, packages = ?packages, "planned package install");
  Ok(PackagesPlan { release, packages })
}

async fn install_all(
  release: &Release,
  packages: &[String],
  options: &RunOptions,
  reporter: &dyn Reporter,
) -> Result<Vec<PackageReport>, RunError> {
  let store = PackageStore::new(options.paths());
  store.ensure_layout()?;
  let build_options = options.build_options();

  let mut reports = Vec::with_capacity(packages.len());
  for name in packages {
    let outcome = install_package(&store, release, name, options.force, &build_options, reporter).await?;
    let version = release.packages.get(name).map(|p| p.version.clone()).unwrap_or_default();
    reports.push(PackageReport {
      name: name.clone(),
      version,
      outcome,
    });
  }
  Ok(reports)
}

/// Install the planned packages.
pub async fn install_packages(
  plan: &PackagesPlan,
  options: &RunOptions,
  reporter: &dyn Reporter,
) -> Result<Vec<PackageReport>, RunError> {
  let _lock = InstallLock::acquire(&options.install_dir, "nise-bosh --packages")?;
  install_all(&plan.release, &plan.packages, options, reporter).await
}

/// Install a job: its packages (unless template-only), rendered templates and monit files.
pub async fn install_job(plan: &JobPlan, options: &RunOptions, reporter: &dyn Reporter) -> Result<JobReport, RunError> {
  let _lock = InstallLock::acquire(&options.install_dir, &format!("nise-bosh {}", plan.job.name))?;
  let paths = options.paths();

  let packages = if options.template_only {
    Vec::new()
  } else {
    install_all(&plan.release, &plan.packages, options, reporter).await?
  };

  let overrides = options.overrides();
  let mut rendered = Vec::with_capacity(plan.templates.len());
  let mut entries = Vec::with_capacity(plan.templates.len());
  for (position, template) in plan.templates.iter().enumerate() {
    let spec = plan.release.load_job(template)?;
    let ctx = BindingContext::build(&plan.manifest, &plan.job, &plan.release, &spec, &overrides, host_ip)?;
    let job = render_job(&spec, &ctx, &paths.jobs_dir())?;
    reporter.report(&Event::JobRendered {
      job: &job.name,
      files: job.files.len(),
    });

    entries.push(MonitEntry {
      job: plan.job.name.clone(),
      template: template.clone(),
      position,
      contents: job.monit.clone(),
    });
    rendered.push(job);
  }

  let monit = monit::reconcile(&paths.monit_dir(), &entries, options.keep_monit_files)?;
  reporter.report(&Event::MonitReconciled {
    written: monit.written.len(),
    pruned: monit.pruned.len(),
  });

  info!(job = %plan.job.name, packages = packages.len(), templates = rendered.len(), "job installed");
  Ok(JobReport {
    packages,
    rendered,
    monit,
  })
}

/// Write an archive of the planned job. Nothing is installed.
pub fn build_archive(
  plan: &JobPlan,
  target: Option<&Path>,
  cwd: &Path,
  reporter: &dyn Reporter,
) -> Result<PathBuf, RunError> {
  let default_name = archive::default_archive_name(&plan.job.name, &plan.release);
  let target = archive::archive_target(target, &default_name, cwd);
  let path = archive::build_archive(&plan.release, &plan.templates, &plan.packages, &target)?;
  reporter.report(&Event::ArchiveWritten { path: &path });
  Ok(path)
}

/// The descriptor and version a run would use.
pub fn show_release(repo_dir: &Path, release_file: Option<&Path>) -> Result<SelectedRelease, RunError> {
  let repo = ReleaseRepository::open(repo_dir, release_file.map(Path::to_path_buf))?;
  Ok(repo.select(None)?)
}
