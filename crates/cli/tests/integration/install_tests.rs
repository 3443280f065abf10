//! Job mode integration tests.

use std::fs;

use predicates::prelude::*;

use super::common::{TestEnv, copy_dir, manifest, release_dir};

fn current_ip() -> String {
  nise_lib::platform::host_ip().to_string()
}

fn assert_packages_installed(env: &TestEnv) {
  assert_eq!(env.installed("packages/miku/dayo"), "miku\n");
  assert_eq!(env.installed("packages/luca/dayo"), "tenshi\n");
  assert_eq!(
    fs::read_link(env.install_dir().join("packages/miku")).unwrap(),
    env.install_dir().join("data/packages/miku/2")
  );
  assert_eq!(
    fs::read_link(env.install_dir().join("packages/luca")).unwrap(),
    env.install_dir().join("data/packages/luca/1")
  );
}

fn assert_job_installed(env: &TestEnv, conf: &str) {
  assert_eq!(env.installed("jobs/angel/config/miku.conf"), conf);
  assert_eq!(env.installed("monit/job/0000_angel.angel.monitrc"), "monit mode manual");

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(env.install_dir().join("jobs/angel/bin/miku_ctl"))
      .unwrap()
      .permissions()
      .mode();
    assert_eq!(mode & 0o7777, 0o750);
  }
}

#[test]
fn installs_job_with_yes_flag() {
  let env = TestEnv::new();

  env
    .install_job("deploy.yml", "angel")
    .assert()
    .success()
    .stdout(predicate::str::contains("Running the packaging script for miku"))
    .stdout(predicate::str::contains("Running the packaging script for luca"));

  assert_packages_installed(&env);
  assert_job_installed(&env, &format!("tenshi\n0\n{}\n", current_ip()));
  assert!(env.install_dir().join("data/packages").is_dir());
}

#[test]
fn installs_job_when_confirmed_on_stdin() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg(release_dir())
    .arg(manifest("deploy.yml"))
    .arg("angel")
    .write_stdin("y\n")
    .assert()
    .success();

  assert_packages_installed(&env);
}

#[test]
fn abort_leaves_no_trace() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg(release_dir())
    .arg(manifest("deploy.yml"))
    .arg("angel")
    .write_stdin("n\n")
    .assert()
    .success()
    .stdout(predicate::str::ends_with("Abort.\n"));

  assert!(!env.install_dir().exists());
  assert!(!env.working_dir().exists());
}

#[test]
fn index_and_ip_overrides_are_rendered() {
  let env = TestEnv::new();

  env
    .install_job("deploy.yml", "angel")
    .args(["-i", "39", "-n", "39.39.39.39"])
    .assert()
    .success();

  assert_packages_installed(&env);
  assert_eq!(env.installed("jobs/angel/config/miku.conf"), "tenshi\n39\n39.39.39.39\n");
}

#[test]
fn network_static_ip_is_used_without_override() {
  let env = TestEnv::new();

  env.install_job("deploy_networks.yml", "angel").assert().success();

  assert_eq!(env.installed("jobs/angel/config/miku.conf"), "tenshi\n0\n192.168.13.39\n");
}

#[test]
fn template_only_skips_packages() {
  let env = TestEnv::new();

  env.install_job("deploy.yml", "angel").arg("-t").assert().success();

  assert_job_installed(&env, &format!("tenshi\n0\n{}\n", current_ip()));
  assert!(!env.install_dir().join("data/packages").exists());
  assert!(!env.install_dir().join("packages").exists());
}

#[test]
fn wrong_argument_count_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("-y")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Arguments number error!"));
}

#[test]
fn unknown_job_fails() {
  let env = TestEnv::new();

  env
    .install_job("deploy.yml", "not_exist_job")
    .assert()
    .code(1)
    .stdout("")
    .stderr("Given job does not exist!\n");
}

#[test]
fn missing_repository_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("-y")
    .arg(env.temp.path().join("not_exist"))
    .arg(manifest("deploy.yml"))
    .arg("angel")
    .assert()
    .code(1)
    .stderr("Release repository does not exist.\n");
}

#[test]
fn repository_without_index_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("-y")
    .arg(super::common::fixture_path("release_noindex"))
    .arg(manifest("deploy.yml"))
    .arg("angel")
    .assert()
    .code(1)
    .stderr("No release index found!\nTry `bosh create release` in your release repository.\n");
}

#[test]
fn packaging_failure_forwards_script_stderr() {
  let env = TestEnv::new();

  env
    .install_job("deploy.yml", "broken")
    .assert()
    .code(1)
    .stderr(predicate::str::contains(
      "packaging: line 3: not_exist_command: command not found",
    ));

  assert!(!env.install_dir().join("data/packages/fail/1").exists());
  assert!(!env.install_dir().join("packages/fail").exists());
}

#[test]
fn second_run_skips_installed_packages() {
  let env = TestEnv::new();
  env.install_job("deploy.yml", "angel").assert().success();
  let dayo = env.install_dir().join("packages/miku/dayo");
  let before = fs::metadata(&dayo).unwrap().modified().unwrap();

  env
    .install_job("deploy.yml", "angel")
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "The same version of the package is already installed. Skipping",
    ))
    .stdout(predicate::str::contains("Running the packaging script").not());

  let after = fs::metadata(&dayo).unwrap().modified().unwrap();
  assert_eq!(before, after);
  assert_packages_installed(&env);
}

#[test]
fn force_rebuilds_installed_packages() {
  let env = TestEnv::new();
  env.install_job("deploy.yml", "angel").assert().success();
  let dayo = env.install_dir().join("packages/miku/dayo");
  let before = fs::metadata(&dayo).unwrap().modified().unwrap();

  // Leave the filesystem clock room to tick.
  std::thread::sleep(std::time::Duration::from_millis(1100));

  env
    .install_job("deploy.yml", "angel")
    .arg("-f")
    .assert()
    .success()
    .stdout(predicate::str::contains("Running the packaging script for miku"))
    .stdout(predicate::str::contains("Running the packaging script for luca"));

  let after = fs::metadata(&dayo).unwrap().modified().unwrap();
  assert_ne!(before, after);
}

#[test]
fn pinned_release_version_is_installed() {
  let env = TestEnv::new();

  env.install_job("deploy_release1.yml", "angel").assert().success();

  assert_eq!(
    fs::read_link(env.install_dir().join("packages/miku")).unwrap(),
    env.install_dir().join("data/packages/miku/1")
  );
  // miku 1 comes from the cached build, not the current sources.
  assert_eq!(env.installed("packages/miku/dayo"), "miku 1\n");
}

#[test]
fn release_without_cached_builds_is_built_from_sources() {
  let env = TestEnv::new();
  let repo = env.temp.path().join("release_nolocal");
  copy_dir(&release_dir(), &repo);
  fs::remove_dir_all(repo.join(".dev_builds")).unwrap();

  env
    .cmd()
    .arg("-y")
    .arg(&repo)
    .arg(manifest("deploy_release1.yml"))
    .arg("angel")
    .assert()
    .success();

  assert_eq!(
    fs::read_link(env.install_dir().join("packages/miku")).unwrap(),
    env.install_dir().join("data/packages/miku/1")
  );
  assert_eq!(env.installed("packages/miku/dayo"), "miku\n");
}

#[test]
fn release_file_option_bypasses_index() {
  let env = TestEnv::new();

  env
    .install_job("deploy.yml", "angel")
    .arg("-r")
    .arg(release_dir().join("dev_releases/vocaloid-1.yml"))
    .assert()
    .success();

  assert_eq!(
    fs::read_link(env.install_dir().join("packages/miku")).unwrap(),
    env.install_dir().join("data/packages/miku/1")
  );
}
