//! nise-lib: install a BOSH-style release onto a single host.
//!
//! The engine reads a release repository and a deployment manifest, then:
//! - builds each needed package version once and activates it by symlink
//! - renders job templates against the job's index, IP and properties
//! - reconciles the monit configuration directory
//! - packs a job and its packages into a self-contained archive

pub mod archive;
pub mod consts;
pub mod engine;
pub mod install_lock;
pub mod manifest;
pub mod monit;
pub mod package;
pub mod platform;
pub mod release;
pub mod report;
pub mod resolve;
pub mod template;
pub mod util;
