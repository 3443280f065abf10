//! Rendering a job's templates into the install root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::TemplateError;
use super::binding::BindingContext;
use super::parser::render;
use crate::release::JobSpec;

/// Result of rendering one job.
#[derive(Debug, Clone)]
pub struct RenderedJob {
  pub name: String,
  /// `jobs/<name>` in the install root.
  pub dir: PathBuf,
  /// Destinations relative to `dir`, in template order.
  pub files: Vec<String>,
  /// The rendered monit template.
  pub monit: String,
}

/// Render every template of `spec` into `<jobs_dir>/<name>` and render its monit file.
///
/// Output is written to a staging directory first. The previous job
/// directory is only replaced once every file rendered.
pub fn render_job(spec: &JobSpec, ctx: &BindingContext, jobs_dir: &Path) -> Result<RenderedJob, TemplateError> {
  let target = jobs_dir.join(&spec.name);
  let staging = jobs_dir.join(format!(".{}.staging", spec.name));

  let monit = render(&spec.monit, ctx).map_err(|e| e.in_template(format!("{}/monit", spec.name)))?;

  remove_dir_if_exists(&staging)?;
  fs::create_dir_all(&staging).map_err(TemplateError::io(&staging))?;

  let result = render_into(spec, ctx, &staging);
  let files = match result {
    Ok(files) => files,
    Err(e) => {
      let _ = fs::remove_dir_all(&staging);
      return Err(e);
    }
  };

  remove_dir_if_exists(&target)?;
  fs::rename(&staging, &target).map_err(TemplateError::io(&target))?;

  info!(job = %spec.name, files = files.len(), path = ?target, "rendered job templates");

  Ok(RenderedJob {
    name: spec.name.clone(),
    dir: target,
    files,
    monit,
  })
}

fn render_into(spec: &JobSpec, ctx: &BindingContext, dir: &Path) -> Result<Vec<String>, TemplateError> {
  let mut files = Vec::with_capacity(spec.templates.len());

  for template in &spec.templates {
    let contents = render(&template.contents, ctx)
      .map_err(|e| e.in_template(format!("{}/templates/{}", spec.name, template.source)))?;

    let path = dir.join(&template.destination);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(TemplateError::io(parent))?;
    }
    fs::write(&path, contents).map_err(TemplateError::io(&path))?;
    set_mode(&path, template.mode)?;

    debug!(
      job = %spec.name,
      source = %template.source,
      destination = %template.destination,
      mode = %format!("{:o}", template.mode),
      "rendered template"
    );
    files.push(template.destination.clone());
  }

  Ok(files)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), TemplateError> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(TemplateError::io(path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), TemplateError> {
  Ok(())
}

fn remove_dir_if_exists(path: &Path) -> Result<(), TemplateError> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(TemplateError::io(path)(e)),
  }
}
