use crate::classify::Classifier;
use crate::classify::SkipPolicy;
use crate::classify::Verdict;
use crate::compare::CompareOptions;
use crate::compare::Comparator;
use crate::discover::discover_corpus;
use crate::discover::Filter;
use crate::discover::TestCase;
use crate::process::ProcessRunner;
use crate::process::RunnerConfig;
use crate::report::CaseResult;
use crate::report::Report;
use crate::HarnessError;
use crate::Result;
use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::info;

/// Matches the main thread, which the oracle's depth ceiling is sized for.
const WORKER_STACK_SIZE: usize = 8 << 20;

#[derive(Debug, Clone)]
pub struct DriverOptions {
  pub corpus: PathBuf,
  pub filter: Filter,
  pub runner: RunnerConfig,
  pub compare: CompareOptions,
  pub skip_policy: SkipPolicy,
  /// Number of documents checked concurrently; 1 runs sequentially.
  pub jobs: usize,
  pub allow_empty: bool,
}

impl DriverOptions {
  pub fn new(corpus: impl Into<PathBuf>, runner: RunnerConfig) -> Self {
    DriverOptions {
      corpus: corpus.into(),
      filter: Filter::All,
      runner,
      compare: CompareOptions::default(),
      skip_policy: SkipPolicy::default(),
      jobs: 1,
      allow_empty: false,
    }
  }
}

/// Runs every selected corpus document through the program under test.
///
/// Failing verdicts are written to `sink` as they are found, followed by a
/// summary line once the corpus is done. Errors local to one document become
/// a failing verdict for it; only errors that invalidate the whole run (the
/// program cannot be launched, the corpus cannot be read) are returned.
pub fn run_corpus<W: Write + Send>(opts: &DriverOptions, sink: &mut W) -> Result<Report> {
  let cases = discover_corpus(&opts.corpus, &opts.filter)?;
  if cases.is_empty() && !opts.allow_empty {
    return Err(HarnessError::Corpus(format!(
      "no test cases selected under {}",
      opts.corpus.display()
    )));
  }

  info!(
    cases = cases.len(),
    corpus = %opts.corpus.display(),
    program = %opts.runner.program.display(),
    jobs = opts.jobs,
    "running corpus"
  );

  let runner = ProcessRunner::new(opts.runner.clone());
  let classifier = Classifier::new(Comparator::new(opts.compare), opts.skip_policy);
  let sink = Mutex::new(sink);

  let results = if opts.jobs <= 1 {
    cases
      .iter()
      .map(|case| run_case(&runner, &classifier, case, &sink))
      .collect::<Result<Vec<_>>>()?
  } else {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(opts.jobs)
      .stack_size(WORKER_STACK_SIZE)
      .build()
      .map_err(|err| HarnessError::Internal(format!("build thread pool: {err}")))?;
    pool.install(|| {
      cases
        .par_iter()
        .map(|case| run_case(&runner, &classifier, case, &sink))
        .collect::<Result<Vec<_>>>()
    })?
  };

  let report: Report = results.into_iter().collect();
  let sink = sink.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
  writeln!(sink, "{}", report.summary()).ok();
  info!(failures = report.failures(), "corpus finished");
  Ok(report)
}

fn run_case<W: Write>(
  runner: &ProcessRunner,
  classifier: &Classifier,
  case: &TestCase,
  sink: &Mutex<W>,
) -> Result<CaseResult> {
  let start = Instant::now();
  let verdict = match runner
    .run(&case.path)
    .and_then(|outcome| classifier.classify(case, &outcome))
  {
    Ok(verdict) => verdict,
    Err(err) if err.is_fatal() => return Err(err),
    Err(err) => Verdict::Fail(format!("harness error: {err}")),
  };

  if verdict.is_failure() {
    let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    writeln!(
      sink,
      "{} {}: {}",
      verdict.label(),
      case.id,
      verdict.detail().unwrap_or_default()
    )
    .ok();
  }

  Ok(CaseResult {
    id: case.id.clone(),
    expectation: case.expectation,
    verdict,
    duration_ms: start.elapsed().as_millis(),
  })
}
