//! Show mode (`-w`) integration tests.

use super::common::{TestEnv, fixture_path, release_dir};

#[test]
fn shows_latest_release_file() {
  let env = TestEnv::new();
  let expected = format!("{}\n", release_dir().join("dev_releases/vocaloid-2.yml").display());

  env.cmd().arg("-w").arg(release_dir()).assert().success().stdout(expected);
}

#[test]
fn shows_release_version() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["-w", "-m"])
    .arg(release_dir())
    .assert()
    .success()
    .stdout("2\n");
}

#[test]
fn release_file_option_is_shown_verbatim() {
  let env = TestEnv::new();
  let release_file = release_dir().join("dev_releases/vocaloid-1.yml");

  env
    .cmd()
    .args(["-w", "-m", "-r"])
    .arg(&release_file)
    .arg(release_dir())
    .assert()
    .success()
    .stdout("1\n");
}

#[test]
fn show_does_not_create_install_dir() {
  let env = TestEnv::new();

  env.cmd().arg("-w").arg(release_dir()).assert().success();

  assert!(!env.install_dir().exists());
}

#[test]
fn show_without_index_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("-w")
    .arg(fixture_path("release_noindex"))
    .assert()
    .code(1)
    .stderr("No release index found!\nTry `bosh create release` in your release repository.\n");
}
