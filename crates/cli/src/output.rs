//! CLI output formatting utilities.
//!
//! Status lines go to stdout with a colored marker. Errors go to stderr
//! unadorned so engine messages reach the user exactly as worded.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

use nise_lib::report::{Event, Reporter};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const INFO: &str = "•";
  pub const SKIP: &str = "-";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Join a list for a single status line.
pub fn format_list(items: &[String]) -> String {
  if items.is_empty() {
    "(none)".to_string()
  } else {
    items.join(", ")
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_skipped(message: &str) {
  println!(
    "{} {}",
    symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!("{}", message.if_supports_color(Stream::Stderr, |s| s.red()));
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Prints engine progress as status lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
  fn report(&self, event: &Event<'_>) {
    let message = event.to_string();
    match event {
      Event::PackageSkipped { name, version } => print_skipped(&format!("{name} ({version}): {message}")),
      Event::PackageBuilding { .. } => print_info(&message),
      Event::PackageInstalled { .. } | Event::JobRendered { .. } | Event::ArchiveWritten { .. } => {
        print_success(&message)
      }
      Event::MonitReconciled { .. } => print_info(&message),
    }
  }
}
