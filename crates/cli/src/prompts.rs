use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Ask `message` and read one answer line from stdin.
///
/// Stdin is read even when it is not a terminal, so answers can be piped in.
/// End of input counts as "no".
pub fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }

  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin()
    .lock()
    .read_line(&mut input)
    .context("Failed to read confirmation")?;

  Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
  matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
