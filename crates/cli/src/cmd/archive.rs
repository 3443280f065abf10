//! Implementation of the archive mode (`-a`).
//!
//! Packs a job, its packages and their sources into a tarball that can be
//! installed elsewhere with `-r <dir>/release.yml <dir>/release`.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};

use nise_lib::engine::{RunOptions, build_archive, plan_job};

use crate::output::{TerminalReporter, format_list, print_info, print_stat};
use crate::prompts::confirm;

pub fn cmd_archive(
  repo: &Path,
  manifest: &Path,
  job: &str,
  target: Option<&Path>,
  options: &RunOptions,
  assume_yes: bool,
) -> Result<()> {
  let plan = plan_job(repo, manifest, job, options)?;

  print_info(&format!(
    "Archive of job {} from release {}-{}",
    plan.job.name, plan.release.name, plan.release.version
  ));
  print_stat("Templates", &format_list(&plan.templates));
  print_stat("Packages", &format_list(&plan.packages));

  if !confirm("Continue?", assume_yes)? {
    println!("Abort.");
    return Ok(());
  }

  let cwd = env::current_dir().context("Failed to read the current directory")?;
  let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);
  build_archive(&plan, target, &cwd, &TerminalReporter)?;

  Ok(())
}
