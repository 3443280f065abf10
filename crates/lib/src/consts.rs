//! Crate-wide constants.

pub const APP_NAME: &str = "nise-bosh";

/// Default install root, matching the layout a BOSH agent uses.
pub const DEFAULT_INSTALL_DIR: &str = "/var/vcap";

/// Default root for package compile directories.
pub const DEFAULT_WORKING_DIR: &str = "/tmp/nise_bosh";

pub const INSTALL_DIR_ENV: &str = "NISE_BOSH_INSTALL_DIR";
pub const WORKING_DIR_ENV: &str = "NISE_BOSH_WORKING_DIR";

/// January 1, 1980 00:00:00 UTC. Used for packaging scripts and archive entry mtimes.
pub const SOURCE_DATE_EPOCH: u64 = 315532800;

/// File name of a packaging script inside a package directory.
pub const PACKAGING_SCRIPT: &str = "packaging";

/// File name of a package or job spec.
pub const SPEC_FILE: &str = "spec";

/// File name of a job's monit template.
pub const MONIT_TEMPLATE: &str = "monit";

/// Extension of files owned by the monit reconciler.
pub const MONIT_EXTENSION: &str = "monitrc";

/// Top-level names inside a job archive.
pub const ARCHIVE_DESCRIPTOR: &str = "release.yml";
pub const ARCHIVE_RELEASE_DIR: &str = "release";
