//! Monit reconciliation across job installs.

use super::common::TestEnv;

#[test]
fn keep_monit_files_preserves_other_jobs() {
  let env = TestEnv::new();
  let monit_dir = env.install_dir().join("monit/job");

  env.install_job("deploy.yml", "angel").arg("-n").arg("10.0.0.1").assert().success();
  env
    .install_job("deploy.yml", "yellows")
    .args(["--keep-monit-files", "-n", "10.0.0.1"])
    .assert()
    .success();

  assert!(monit_dir.join("0000_angel.angel.monitrc").is_file());
  assert!(monit_dir.join("0000_yellows.yellows.monitrc").is_file());

  env.install_job("deploy.yml", "angel").arg("-n").arg("10.0.0.1").assert().success();

  assert!(monit_dir.join("0000_angel.angel.monitrc").is_file());
  assert!(!monit_dir.join("0000_yellows.yellows.monitrc").exists());
  assert_eq!(env.installed("jobs/angel/config/miku.conf"), "tenshi\n0\n10.0.0.1\n");
}

#[test]
fn install_without_keep_replaces_monit_files() {
  let env = TestEnv::new();
  let monit_dir = env.install_dir().join("monit/job");

  env.install_job("deploy.yml", "angel").arg("-t").assert().success();
  env.install_job("deploy.yml", "yellows").arg("-t").assert().success();

  assert!(!monit_dir.join("0000_angel.angel.monitrc").exists());
  assert_eq!(env.installed("monit/job/0000_yellows.yellows.monitrc"), "check process yellows\n");
}
