//! Implementation of the default job mode.
//!
//! Installs the packages a manifest job needs, renders the job's templates
//! and rewrites the monit directory.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use nise_lib::engine::{JobPlan, RunOptions, install_job, plan_job};
use nise_lib::package::InstallOutcome;

use super::runtime;
use crate::output::{TerminalReporter, format_duration, format_list, print_info, print_stat, print_success};
use crate::prompts::confirm;

fn print_plan(plan: &JobPlan, options: &RunOptions) {
  print_info(&format!(
    "Job {} from release {}-{}",
    plan.job.name, plan.release.name, plan.release.version
  ));
  print_stat("Install directory", &options.install_dir.display().to_string());
  print_stat("Templates", &format_list(&plan.templates));
  if options.template_only {
    print_stat("Packages", "skipped (template only)");
  } else {
    print_stat("Packages", &format_list(&plan.packages));
  }
}

/// Execute the job install.
///
/// Nothing is written before the user confirms.
pub fn cmd_install(repo: &Path, manifest: &Path, job: &str, options: &RunOptions, assume_yes: bool) -> Result<()> {
  let plan = plan_job(repo, manifest, job, options)?;
  print_plan(&plan, options);

  if !confirm("Continue?", assume_yes)? {
    println!("Abort.");
    return Ok(());
  }

  let started = Instant::now();
  let rt = runtime()?;
  let report = rt.block_on(install_job(&plan, options, &TerminalReporter))?;

  let built = report
    .packages
    .iter()
    .filter(|p| p.outcome == InstallOutcome::Built)
    .count();
  let files: usize = report.rendered.iter().map(|j| j.files.len()).sum();

  println!();
  print_success(&format!(
    "Job {} installed in {}",
    plan.job.name,
    format_duration(started.elapsed())
  ));
  print_stat("Packages built", &built.to_string());
  print_stat("Packages skipped", &(report.packages.len() - built).to_string());
  print_stat("Files rendered", &files.to_string());
  print_stat("Monit files", &report.monit.written.len().to_string());

  Ok(())
}
