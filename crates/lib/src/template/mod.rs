//! Job template rendering.
//!
//! # Submodules
//!
//! - [`parser`] - The ERB subset: parsing, expression evaluation, output
//! - [`binding`] - Index, IP, network and property values for one render
//! - [`render`] - Writing a job's rendered files into the install root

pub mod binding;
pub mod parser;
pub mod render;

use std::path::PathBuf;

use thiserror::Error;

pub use binding::{BindingContext, BindingOverrides};
pub use parser::{Expr, Resolver, Segment, parse};
pub use render::{RenderedJob, render_job};

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("unclosed template tag at position {0}")]
  Unclosed(usize),

  #[error("malformed template: {0}")]
  Malformed(String),

  #[error("unknown binding '{0}'")]
  UnknownBinding(String),

  #[error("property '{0}' is not set and has no default")]
  MissingProperty(String),

  #[error("invalid properties: {0}")]
  Properties(String),

  #[error("failed to render {template}: {source}")]
  Render {
    template: String,
    #[source]
    source: Box<TemplateError>,
  },

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl TemplateError {
  /// Attach the template the error happened in.
  pub fn in_template(self, template: impl Into<String>) -> Self {
    TemplateError::Render {
      template: template.into(),
      source: Box::new(self),
    }
  }

  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> TemplateError {
    let path = path.into();
    move |source| TemplateError::Io { path, source }
  }
}
