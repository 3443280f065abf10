//! Packages mode (`-p`) integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, release_dir};

#[test]
fn installs_packages_and_dependencies() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["-y", "-p"])
    .arg(release_dir())
    .args(["luca", "kaito"])
    .assert()
    .success();

  assert_eq!(env.installed("packages/miku/dayo"), "miku\n");
  assert_eq!(env.installed("packages/luca/dayo"), "tenshi\n");
  assert_eq!(env.installed("packages/kaito/dayo"), "tenshi\n");
}

#[test]
fn no_dependency_installs_only_named_packages() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["-y", "-p", "--no-dependency"])
    .arg(release_dir())
    .arg("luca")
    .assert()
    .success();

  assert!(!env.install_dir().join("packages/miku").exists());
  assert_eq!(env.installed("packages/luca/dayo"), "tenshi\n");
}

#[test]
fn unknown_package_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["-y", "-p"])
    .arg(release_dir())
    .arg("not_exist_package")
    .assert()
    .code(1)
    .stdout("")
    .stderr("Given package not_exist_package does not exist!\n");
}

#[test]
fn packages_mode_needs_a_package() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["-y", "-p"])
    .arg(release_dir())
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Arguments number error!"));
}

#[test]
fn abort_installs_nothing() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("-p")
    .arg(release_dir())
    .arg("miku")
    .write_stdin("no\n")
    .assert()
    .success()
    .stdout(predicate::str::contains("Abort."));

  assert!(!env.install_dir().exists());
}
