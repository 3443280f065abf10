mod cmd;
mod output;
mod prompts;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nise_lib::engine::{RunError, RunOptions};

use crate::cmd::{cmd_archive, cmd_install, cmd_packages, cmd_show};
use crate::output::print_error;

/// nise-bosh - install BOSH release jobs and packages onto this host
#[derive(Parser, Debug)]
#[command(name = "nise-bosh")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").args(["packages", "archive", "show_release"])))]
struct Cli {
  /// Install the given packages instead of a job: <release_repo> <package>...
  #[arg(short = 'p', long = "packages")]
  packages: bool,

  /// Write a job archive instead of installing: <release_repo> <manifest> <job> [<target>]
  #[arg(short = 'a', long = "archive")]
  archive: bool,

  /// Print the selected release file: <release_repo>
  #[arg(short = 'w', long = "show-release")]
  show_release: bool,

  /// With -w, print the release version instead of the file path
  #[arg(short = 'm', long = "show-version")]
  show_version: bool,

  /// Install directory (default: /var/vcap)
  #[arg(short = 'd', long = "install-dir")]
  install_dir: Option<PathBuf>,

  /// Working directory for package compilation (default: /tmp/nise_bosh)
  #[arg(long = "working-dir")]
  working_dir: Option<PathBuf>,

  /// Release file to use instead of the repository's index
  #[arg(short = 'r', long = "release-file")]
  release_file: Option<PathBuf>,

  /// Do not ask for confirmation
  #[arg(short = 'y', long = "yes")]
  yes: bool,

  /// Rebuild packages even when the same version is installed
  #[arg(short = 'f', long = "force")]
  force: bool,

  /// Render job templates only, skip packages
  #[arg(short = 't', long = "template-only")]
  template_only: bool,

  /// Instance index of the job
  #[arg(short = 'i', long = "index")]
  index: Option<u32>,

  /// IP address of this host
  #[arg(short = 'n', long = "ip")]
  ip: Option<String>,

  /// Install only the named packages, not their dependencies
  #[arg(long = "no-dependency")]
  no_dependency: bool,

  /// Keep monit files of other jobs
  #[arg(long = "keep-monit-files")]
  keep_monit_files: bool,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,

  /// Positional arguments, depending on the mode
  args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Job,
  Packages,
  Archive,
  Show,
}

impl Cli {
  fn mode(&self) -> Mode {
    if self.show_release {
      Mode::Show
    } else if self.archive {
      Mode::Archive
    } else if self.packages {
      Mode::Packages
    } else {
      Mode::Job
    }
  }

  fn check_arguments(&self) -> Result<(), RunError> {
    let count = self.args.len();
    let valid = match self.mode() {
      Mode::Job => count == 3,
      Mode::Packages => count >= 2,
      Mode::Archive => count == 3 || count == 4,
      Mode::Show => count == 1,
    };
    if valid { Ok(()) } else { Err(RunError::Arguments) }
  }

  fn run_options(&self) -> RunOptions {
    let defaults = RunOptions::default();
    RunOptions {
      install_dir: self.install_dir.clone().unwrap_or(defaults.install_dir),
      working_dir: self.working_dir.clone().unwrap_or(defaults.working_dir),
      release_file: self.release_file.clone(),
      force: self.force,
      template_only: self.template_only,
      index: self.index,
      ip: self.ip.clone(),
      transitive: !self.no_dependency,
      keep_monit_files: self.keep_monit_files,
      shell: defaults.shell,
    }
  }
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
  cli.check_arguments()?;
  let options = cli.run_options();
  let args = &cli.args;
  let mode = cli.mode();
  debug!(mode = ?mode, args = ?args, install_dir = %options.install_dir.display(), "starting");

  match mode {
    Mode::Job => cmd_install(Path::new(&args[0]), Path::new(&args[1]), &args[2], &options, cli.yes),
    Mode::Packages => cmd_packages(Path::new(&args[0]), &args[1..], &options, cli.yes),
    Mode::Archive => cmd_archive(
      Path::new(&args[0]),
      Path::new(&args[1]),
      &args[2],
      args.get(3).map(Path::new),
      &options,
      cli.yes,
    ),
    Mode::Show => cmd_show(Path::new(&args[0]), options.release_file.as_deref(), cli.show_version),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&err.to_string());
      ExitCode::FAILURE
    }
  }
}
