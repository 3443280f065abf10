//! Shared fixtures for library tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use nise_lib::engine::RunOptions;
use nise_lib::report::{Event, Reporter};
use tempfile::TempDir;

pub fn write(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

const INDEX: &str = r#"builds:
  a1:
    version: '1'
  b2:
    version: '2'
"#;

const RELEASE_1: &str = r#"name: vocaloid
version: '1'
packages:
- name: miku
  version: '1'
- name: luca
  version: '1'
  dependencies: [miku]
- name: kaito
  version: '1'
jobs:
- name: angel
  version: '1'
- name: yellows
  version: '1'
"#;

const RELEASE_2: &str = r#"name: vocaloid
version: '2'
packages:
- name: miku
  version: '2'
- name: luca
  version: '1'
  dependencies: [miku]
- name: kaito
  version: '1'
- name: fail
  version: '1'
jobs:
- name: angel
  version: '1'
- name: yellows
  version: '1'
"#;

pub const MANIFEST: &str = r#"name: vocaloid-dev
release:
  name: vocaloid
  version: latest
networks:
- name: default
  subnets:
  - static: [192.168.13.39]
jobs:
- name: angel
  template: angel
  instances: 1
  networks:
  - name: default
  properties:
    miku:
      name: tenshi
- name: yellows
  template: yellows
  networks:
  - name: default
    static_ips: [10.0.0.1]
- name: pool
  templates:
  - name: angel
  - name: yellows
  index: 2
  networks:
  - name: default
    static_ips: [10.0.0.1, 10.0.0.2, 10.0.0.3]
properties:
  miku:
    name: global
"#;

/// A release repository with packages miku, luca (depends on miku), kaito and
/// fail, and jobs angel (needs luca) and yellows (needs kaito).
pub fn release_repo() -> TempDir {
  let temp = TempDir::new().unwrap();
  let root = temp.path();

  write(root, "dev_releases/index.yml", INDEX);
  write(root, "dev_releases/vocaloid-1.yml", RELEASE_1);
  write(root, "dev_releases/vocaloid-2.yml", RELEASE_2);

  for name in ["miku", "luca", "kaito"] {
    write(root, &format!("packages/{name}/spec"), &format!("name: {name}\nfiles:\n- {name}/dayo\n"));
    write(
      root,
      &format!("packages/{name}/packaging"),
      &format!("cp -a {name}/dayo ${{BOSH_INSTALL_TARGET}}/dayo\necho $$ > ${{BOSH_INSTALL_TARGET}}/build_id\n"),
    );
    write(root, &format!("src/{name}/dayo"), "dayo\n");
  }
  write(root, "packages/fail/spec", "name: fail\n");
  write(root, "packages/fail/packaging", "echo start\necho more\nnot_exist_command\n");

  write(
    root,
    "jobs/angel/spec",
    r#"name: angel
templates:
  miku.conf.erb: config/miku.conf
  miku_ctl.erb: bin/miku_ctl
packages: [luca]
properties:
  miku.name:
    default: unknown
  miku.port:
    default: 39
"#,
  );
  write(
    root,
    "jobs/angel/templates/miku.conf.erb",
    "<%= p(\"miku.name\") %>\n<%= index %>\n<%= ip %>\n",
  );
  write(
    root,
    "jobs/angel/templates/miku_ctl.erb",
    "#!/bin/bash\necho <%= name %> <%= p(\"miku.port\") %>\n",
  );
  write(root, "jobs/angel/monit", "check process angel_<%= index %>\n  mode manual\n");

  write(
    root,
    "jobs/yellows/spec",
    "name: yellows\ntemplates:\n  yellows.conf.erb: config/yellows.conf\npackages: [kaito]\n",
  );
  write(
    root,
    "jobs/yellows/templates/yellows.conf.erb",
    "<%= spec.deployment %> <%= ip %>\n",
  );
  write(root, "jobs/yellows/monit", "check process yellows\n");

  temp
}

/// Write a gzipped tarball of `files` at `relative`, the way build caches hold packages.
pub fn write_tarball(root: &Path, relative: &str, files: &[(&str, &str)]) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  let encoder = flate2::write::GzEncoder::new(fs::File::create(path).unwrap(), flate2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap();
}

/// Write `content` as a manifest next to nothing else, returning its path.
pub fn manifest(dir: &Path, content: &str) -> PathBuf {
  let path = dir.join("deploy.yml");
  fs::write(&path, content).unwrap();
  path
}

/// Install root and working directory inside a fresh temp dir.
pub fn options(temp: &Path) -> RunOptions {
  RunOptions {
    install_dir: temp.join("vcap"),
    working_dir: temp.join("work"),
    ..RunOptions::default()
  }
}

#[derive(Default)]
pub struct RecordingReporter {
  pub lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().unwrap().clone()
  }
}

impl Reporter for RecordingReporter {
  fn report(&self, event: &Event<'_>) {
    self.lines.lock().unwrap().push(event.to_string());
  }
}
