//! Implementation of the packages mode (`-p`).

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use nise_lib::engine::{RunOptions, install_packages, plan_packages};
use nise_lib::package::InstallOutcome;

use super::runtime;
use crate::output::{TerminalReporter, format_duration, format_list, print_info, print_stat, print_success};
use crate::prompts::confirm;

/// Install the named packages, with their dependencies unless `--no-dependency` was given.
pub fn cmd_packages(repo: &Path, names: &[String], options: &RunOptions, assume_yes: bool) -> Result<()> {
  let plan = plan_packages(repo, names, options)?;

  print_info(&format!(
    "Packages from release {}-{}",
    plan.release.name, plan.release.version
  ));
  print_stat("Install directory", &options.install_dir.display().to_string());
  print_stat("Packages", &format_list(&plan.packages));

  if !confirm("Continue?", assume_yes)? {
    println!("Abort.");
    return Ok(());
  }

  let started = Instant::now();
  let rt = runtime()?;
  let reports = rt.block_on(install_packages(&plan, options, &TerminalReporter))?;
  let built = reports.iter().filter(|p| p.outcome == InstallOutcome::Built).count();

  println!();
  print_success(&format!(
    "{} package(s) installed in {}",
    reports.len(),
    format_duration(started.elapsed())
  ));
  print_stat("Built", &built.to_string());
  print_stat("Skipped", &(reports.len() - built).to_string());

  Ok(())
}
