//! Archive mode (`-a`) integration tests.

use std::fs;

use predicates::prelude::*;

use nise_lib::archive::restore_archive;

use super::common::{TestEnv, contents, manifest, release_dir};

const DEFAULT_ARCHIVE_NAME: &str = "angel_vocaloid-2.tar.gz";

fn archive_cmd(env: &TestEnv) -> assert_cmd::Command {
  let mut cmd = env.cmd();
  cmd.args(["-y", "-a"]).arg(release_dir()).arg(manifest("deploy.yml")).arg("angel");
  cmd
}

#[test]
fn archive_defaults_to_current_directory() {
  let env = TestEnv::new();
  let scratch = env.scratch_dir();

  archive_cmd(&env)
    .current_dir(&scratch)
    .assert()
    .success()
    .stdout(predicate::str::contains(DEFAULT_ARCHIVE_NAME));

  assert!(scratch.join(DEFAULT_ARCHIVE_NAME).is_file());
  assert!(!env.install_dir().exists());
}

#[test]
fn archive_into_directory_uses_default_name() {
  let env = TestEnv::new();
  let scratch = env.scratch_dir();

  archive_cmd(&env).arg(&scratch).assert().success();

  assert!(scratch.join(DEFAULT_ARCHIVE_NAME).is_file());
}

#[test]
fn archive_with_file_name() {
  let env = TestEnv::new();
  let target = env.scratch_dir().join("angel.tar.gz");

  archive_cmd(&env).arg(&target).assert().success();

  assert!(target.is_file());
}

#[test]
fn archive_never_overwrites() {
  let env = TestEnv::new();
  let target = env.scratch_dir().join("angel.tar.gz");
  fs::write(&target, "precious").unwrap();

  archive_cmd(&env).arg(&target).assert().code(1);

  assert_eq!(fs::read_to_string(&target).unwrap(), "precious");
}

#[test]
fn extracted_archive_installs_like_the_repository() {
  let direct = TestEnv::new();
  direct
    .install_job("deploy.yml", "angel")
    .args(["-n", "10.0.0.1"])
    .assert()
    .success();

  let env = TestEnv::new();
  let target = env.scratch_dir().join("angel.tar.gz");
  archive_cmd(&env).arg(&target).assert().success();

  let extraction = env.scratch_dir().join("extracted");
  let restored = restore_archive(&target, &extraction).unwrap();

  env
    .cmd()
    .args(["-y", "-n", "10.0.0.1", "-r"])
    .arg(&restored.descriptor)
    .arg(&restored.release_dir)
    .arg(manifest("deploy.yml"))
    .arg("angel")
    .assert()
    .success();

  for file in [
    "packages/miku/dayo",
    "packages/luca/dayo",
    "jobs/angel/config/miku.conf",
    "jobs/angel/bin/miku_ctl",
    "monit/job/0000_angel.angel.monitrc",
  ] {
    assert_eq!(
      contents(&env.install_dir(), file),
      contents(&direct.install_dir(), file),
      "{file}"
    );
  }
}
