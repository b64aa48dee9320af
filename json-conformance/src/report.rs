use crate::classify::Verdict;
use crate::discover::Expectation;
use crate::HarnessError;
use crate::Result;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseResult {
  pub id: String,
  pub expectation: Expectation,
  pub verdict: Verdict,
  pub duration_ms: u128,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
  pub total: usize,
  pub passed: usize,
  pub failed: usize,
  pub crashed: usize,
  pub skipped: usize,
}

impl Summary {
  fn record(&mut self, verdict: &Verdict) {
    self.total += 1;
    match verdict {
      Verdict::Pass => self.passed += 1,
      Verdict::Fail(_) => self.failed += 1,
      Verdict::Crash(_) => self.crashed += 1,
      Verdict::Skip(_) => self.skipped += 1,
    }
  }

  pub fn failures(&self) -> usize {
    self.failed + self.crashed
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} passed, {} failed, {} crashed, {} skipped ({} failures)",
      self.passed,
      self.failed,
      self.crashed,
      self.skipped,
      self.failures()
    )
  }
}

/// Verdicts in corpus order. Results are only ever appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
  summary: Summary,
  results: Vec<CaseResult>,
}

impl Report {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, result: CaseResult) {
    self.summary.record(&result.verdict);
    self.results.push(result);
  }

  pub fn summary(&self) -> &Summary {
    &self.summary
  }

  pub fn results(&self) -> &[CaseResult] {
    &self.results
  }

  pub fn failures(&self) -> usize {
    self.summary.failures()
  }

  /// 0 when nothing failed or crashed, 1 otherwise.
  pub fn exit_code(&self) -> u8 {
    if self.failures() == 0 {
      0
    } else {
      1
    }
  }
}

impl FromIterator<CaseResult> for Report {
  fn from_iter<I: IntoIterator<Item = CaseResult>>(iter: I) -> Self {
    let mut report = Report::new();
    for result in iter {
      report.push(result);
    }
    report
  }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
  schema_version: u32,
  summary: &'a Summary,
  results: &'a [CaseResult],
}

impl<'a> JsonReport<'a> {
  fn new(report: &'a Report) -> Self {
    Self {
      schema_version: REPORT_SCHEMA_VERSION,
      summary: &report.summary,
      results: &report.results,
    }
  }
}

/// Write the report as pretty JSON to `writer`.
pub fn write_json_report_to_writer<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
  serde_json::to_writer_pretty(&mut *writer, &JsonReport::new(report))
    .map_err(|err| HarnessError::Report(err.to_string()))?;
  writeln!(writer)?;
  Ok(())
}

/// Write the report as pretty JSON to `path`, creating parent directories as
/// needed.
pub fn write_json_report(path: &Path, report: &Report) -> Result<()> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }

  let file = fs::File::create(path)?;
  let mut writer = BufWriter::new(file);
  write_json_report_to_writer(&mut writer, report)?;
  writer.flush()?;
  Ok(())
}
