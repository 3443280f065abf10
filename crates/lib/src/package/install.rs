//! The idempotent package install operation.

use tracing::{info, warn};

use super::PackageError;
use super::build::{BuildOptions, PackagingEnv, prepare_compile_dir, run_packaging_script};
use super::store::PackageStore;
use crate::release::Release;
use crate::report::{Event, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
  /// The version was already present and left untouched.
  Skipped,
  /// The packaging script ran and produced the version directory.
  Built,
}

/// Install one package of `release` and make its version active.
///
/// An installed version is only rebuilt when `force` is set. A failed build
/// leaves the previously installed version and its link as they were.
pub async fn install_package(
  store: &PackageStore,
  release: &Release,
  name: &str,
  force: bool,
  options: &BuildOptions,
  reporter: &dyn Reporter,
) -> Result<InstallOutcome, PackageError> {
  let spec = release.load_package(name)?;
  let version = spec.version.as_str();
  store.recover(name)?;

  if store.is_installed(name, version) && !force {
    reporter.report(&Event::PackageSkipped { name, version });
    store.activate(name, version)?;
    return Ok(InstallOutcome::Skipped);
  }

  reporter.report(&Event::PackageBuilding { name, version });

  let compile_dir = options.compile_dir(name);
  prepare_compile_dir(&spec, &release.repo_dir, &compile_dir)?;

  let install_target = store.begin_build(name, version)?;
  let env = PackagingEnv {
    install_target,
    compile_target: compile_dir,
    packages_dir: store.paths().packages_dir(),
  };

  if let Err(e) = run_packaging_script(&spec, &env, options).await {
    if let Err(cleanup) = store.abort_build(name, version) {
      warn!(package = %name, version = %version, error = %cleanup, "failed to roll back build");
    }
    return Err(e);
  }

  store.finish_build(name, version)?;
  store.activate(name, version)?;

  info!(package = %name, version = %version, forced = force, "package installed");
  reporter.report(&Event::PackageInstalled { name, version });
  Ok(InstallOutcome::Built)
}
