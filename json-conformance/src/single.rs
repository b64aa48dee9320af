//! One document per process, for external suites that judge by exit code.
//!
//! Exit code 0 means the program accepted the document and the round trip
//! held (or the original could not be read as text under the lenient
//! policy). A rejection propagates the program's own exit code. Anything the
//! harness itself detects, such as a crash, a timeout or a round-trip
//! mismatch, exits with the crash code.

use crate::classify::Classifier;
use crate::classify::SkipPolicy;
use crate::classify::Verdict;
use crate::compare::CompareOptions;
use crate::compare::Comparator;
use crate::process::Abnormal;
use crate::process::ProcessRunner;
use crate::process::RunOutcome;
use crate::process::RunnerConfig;
use crate::HarnessError;
use crate::Result;
use std::fs;
use std::path::Path;
use tracing::debug;
use tracing::error;
use tracing::warn;

pub const EXIT_CRASH: u8 = 2;

#[derive(Debug, Clone)]
pub struct SingleOptions {
  pub runner: RunnerConfig,
  pub compare: CompareOptions,
  pub skip_policy: SkipPolicy,
  pub crash_code: u8,
}

impl SingleOptions {
  pub fn new(runner: RunnerConfig) -> Self {
    SingleOptions {
      runner,
      compare: CompareOptions::default(),
      skip_policy: SkipPolicy::Lenient,
      crash_code: EXIT_CRASH,
    }
  }
}

pub fn run_one(path: &Path, opts: &SingleOptions) -> Result<u8> {
  let runner = ProcessRunner::new(opts.runner.clone());
  let classifier = Classifier::new(Comparator::new(opts.compare), opts.skip_policy);

  let verdict = match runner.run(path)? {
    RunOutcome::Rejected { code } => {
      debug!(path = %path.display(), code, "program rejected document");
      return Ok(propagated_code(code));
    }
    RunOutcome::Accepted { output } => {
      let original = fs::read(path).map_err(|source| HarnessError::ReadCase {
        path: path.to_path_buf(),
        source,
      })?;
      classifier.round_trip(&original, &output)
    }
    RunOutcome::TimedOut { after } => Verdict::Crash(Abnormal::Timeout(after).to_string()),
    RunOutcome::Signaled { signal } => Verdict::Crash(Abnormal::Signaled(signal).to_string()),
  };

  match verdict {
    Verdict::Pass => Ok(0),
    Verdict::Skip(reason) => {
      debug!(path = %path.display(), %reason, "round trip skipped");
      Ok(0)
    }
    Verdict::Fail(detail) | Verdict::Crash(detail) => {
      warn!(path = %path.display(), %detail, "document failed");
      Ok(opts.crash_code)
    }
  }
}

/// Folds a harness error into the crash code.
pub fn exit_code_for(result: Result<u8>, crash_code: u8) -> u8 {
  match result {
    Ok(code) => code,
    Err(err) => {
      error!("{err}");
      crash_code
    }
  }
}

/// Exit codes that do not fit a process exit status still mean rejection.
fn propagated_code(code: i32) -> u8 {
  u8::try_from(code)
    .ok()
    .filter(|code| *code != 0)
    .unwrap_or(1)
}
