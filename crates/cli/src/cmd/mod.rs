mod archive;
mod install;
mod packages;
mod show;

pub use archive::cmd_archive;
pub use install::cmd_install;
pub use packages::cmd_packages;
pub use show::cmd_show;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

/// Runtime for driving packaging scripts. Installs are sequential.
fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
