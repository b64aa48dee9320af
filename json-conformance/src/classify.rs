use crate::compare::Comparator;
use crate::compare::Side;
use crate::discover::Expectation;
use crate::discover::TestCase;
use crate::process::Abnormal;
use crate::process::RunOutcome;
use crate::HarnessError;
use crate::Result;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fs;
use tracing::debug;

/// What to do when the oracle cannot read the original document as text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
  /// Tolerate it as a skip.
  #[default]
  Lenient,
  /// Report it as a crash.
  Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
  Pass,
  Fail(String),
  Crash(String),
  Skip(String),
}

impl Verdict {
  pub fn is_failure(&self) -> bool {
    matches!(self, Verdict::Fail(_) | Verdict::Crash(_))
  }

  pub fn label(&self) -> &'static str {
    match self {
      Verdict::Pass => "PASS",
      Verdict::Fail(_) => "FAIL",
      Verdict::Crash(_) => "CRASH",
      Verdict::Skip(_) => "SKIP",
    }
  }

  pub fn detail(&self) -> Option<&str> {
    match self {
      Verdict::Pass => None,
      Verdict::Fail(detail) | Verdict::Crash(detail) | Verdict::Skip(detail) => Some(detail),
    }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.detail() {
      Some(detail) => write!(f, "{}: {detail}", self.label()),
      None => f.write_str(self.label()),
    }
  }
}

/// Turns a run outcome into a verdict for one test case.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
  comparator: Comparator,
  skip_policy: SkipPolicy,
}

impl Classifier {
  pub fn new(comparator: Comparator, skip_policy: SkipPolicy) -> Self {
    Self {
      comparator,
      skip_policy,
    }
  }

  pub fn skip_policy(&self) -> SkipPolicy {
    self.skip_policy
  }

  /// Abnormal termination is a crash whatever the expectation. Acceptance of
  /// a document that may be accepted goes on to the round-trip check, which
  /// reads the original document from disk.
  pub fn classify(&self, case: &TestCase, outcome: &RunOutcome) -> Result<Verdict> {
    let verdict = match outcome {
      RunOutcome::TimedOut { after } => Verdict::Crash(Abnormal::Timeout(*after).to_string()),
      RunOutcome::Signaled { signal } => Verdict::Crash(Abnormal::Signaled(*signal).to_string()),
      RunOutcome::Rejected { code } => match case.expectation {
        Expectation::MustAccept => Verdict::Fail(format!(
          "expected acceptance, got rejection (exit code {code})"
        )),
        Expectation::MustReject | Expectation::NoConstraint => Verdict::Pass,
      },
      RunOutcome::Accepted { output } => match case.expectation {
        Expectation::MustReject => Verdict::Fail("expected rejection, got acceptance".to_string()),
        Expectation::MustAccept | Expectation::NoConstraint => {
          let original = fs::read(&case.path).map_err(|source| HarnessError::ReadCase {
            path: case.path.clone(),
            source,
          })?;
          self.round_trip(&original, output)
        }
      },
    };

    debug!(case = %case.id, verdict = verdict.label(), "classified");
    Ok(verdict)
  }

  /// Checks that `output` holds the same value as `original`.
  pub fn round_trip(&self, original: &[u8], output: &[u8]) -> Verdict {
    match self.comparator.compare(original, output) {
      Ok(None) => Verdict::Pass,
      Ok(Some(difference)) => Verdict::Fail(format!("round-trip mismatch {difference}")),
      Err(err) if err.side == Side::Original && err.source.is_invalid_text() => {
        match self.skip_policy {
          SkipPolicy::Lenient => {
            Verdict::Skip(format!("original is not readable text: {}", err.source))
          }
          SkipPolicy::Strict => {
            Verdict::Crash(format!("oracle cannot read original: {}", err.source))
          }
        }
      }
      Err(err) => Verdict::Fail(format!("round-trip mismatch: {err}")),
    }
  }
}
