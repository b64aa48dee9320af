#![allow(dead_code)]

use json_conformance::RunnerConfig;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Stands in for a compiled JSON test program. Behaviour is picked from the
/// document's file name so one script can play every part.
pub const FAKE_LIBRARY: &str = r#"#!/bin/sh
name=$(basename "$1")
case "$name" in
  y_number.json) printf '1.0' ;;
  i_number.json) sleep 30 ;;
  *reformat*) printf '1.0' ;;
  *dup_keys*) printf '{"a":2}' ;;
  *mismatch*) printf '[2,1]' ;;
  *garbage*) printf 'not json' ;;
  *hang*) sleep 30 ;;
  *orphan*) sleep 30 & printf '1' ;;
  *detached*) sleep 30 >/dev/null & printf '[1]' ;;
  *segv*) kill -SEGV $$ ;;
  *abort*) kill -ABRT $$ ;;
  *exit3*) exit 3 ;;
  *loud*) head -c 300000 /dev/zero | tr '\000' ' '; cat "$1" ;;
  n_*) exit 1 ;;
  *) cat "$1" ;;
esac
"#;

pub struct Fixture {
  dir: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("corpus")).expect("create corpus dir");
    fs::write(dir.path().join("library.sh"), FAKE_LIBRARY).expect("write fake library");
    Self { dir }
  }

  pub fn corpus(&self) -> PathBuf {
    self.dir.path().join("corpus")
  }

  pub fn script(&self) -> PathBuf {
    self.dir.path().join("library.sh")
  }

  pub fn add(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = self.corpus().join(name);
    fs::write(&path, contents).expect("write corpus document");
    path
  }

  /// Runs the script through `/bin/sh` so the test never execs a file it
  /// has just written.
  pub fn runner(&self) -> RunnerConfig {
    runner_for(&self.script()).with_timeout(Duration::from_secs(2))
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }
}

pub fn runner_for(script: &Path) -> RunnerConfig {
  RunnerConfig::new("/bin/sh").with_args([script.as_os_str().to_owned()])
}
