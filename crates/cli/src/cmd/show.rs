//! Implementation of the show mode (`-w`).

use std::path::Path;

use anyhow::Result;

use nise_lib::engine::show_release;

/// Print the release file a run would use, or its version with `-m`.
///
/// Output is the bare value so scripts can capture it.
pub fn cmd_show(repo: &Path, release_file: Option<&Path>, version_only: bool) -> Result<()> {
  let selected = show_release(repo, release_file)?;
  if version_only {
    println!("{}", selected.version);
  } else {
    println!("{}", selected.descriptor_path.display());
  }
  Ok(())
}
