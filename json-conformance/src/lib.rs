//! Round-trip conformance harness for JSON encoder/decoder test programs.
//!
//! A program under test is invoked once per corpus document. Its exit status
//! says whether the library accepted the document, and on acceptance its
//! standard output is the re-encoded value, which is checked for semantic
//! equality against the original with an independent oracle parser.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod classify;
pub mod compare;
pub mod discover;
pub mod driver;
pub mod process;
pub mod report;
pub mod single;
pub mod text;
pub mod value;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
  #[error("failed to launch {}: {source}", program.display())]
  Launch {
    program: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error(transparent)]
  Io(#[from] io::Error),
  #[error("failed to read {}: {source}", path.display())]
  ReadCase {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("corpus error: {0}")]
  Corpus(String),
  #[error("invalid filter '{0}'")]
  InvalidFilter(String),
  #[error("internal error: {0}")]
  Internal(String),
  #[error("report failed: {0}")]
  Report(String),
}

impl HarnessError {
  /// Errors that invalidate the whole run rather than a single test case.
  pub fn is_fatal(&self) -> bool {
    matches!(self, HarnessError::Launch { .. } | HarnessError::Corpus(_))
  }
}

pub use classify::Classifier;
pub use classify::SkipPolicy;
pub use classify::Verdict;
pub use compare::CompareError;
pub use compare::CompareOptions;
pub use compare::Comparator;
pub use compare::Side;
pub use discover::build_filter;
pub use discover::discover_corpus;
pub use discover::Expectation;
pub use discover::Filter;
pub use discover::TestCase;
pub use driver::run_corpus;
pub use driver::DriverOptions;
pub use process::Abnormal;
pub use process::ProcessRunner;
pub use process::RunOutcome;
pub use process::RunnerConfig;
pub use process::StderrMode;
pub use process::DEFAULT_TIMEOUT;
pub use report::CaseResult;
pub use report::Report;
pub use report::Summary;
pub use report::REPORT_SCHEMA_VERSION;
pub use single::exit_code_for;
pub use single::run_one;
pub use single::SingleOptions;
pub use single::EXIT_CRASH;
pub use value::DecodeError;
pub use value::DuplicateKeys;
pub use value::NumberMode;
pub use value::Value;
pub use value::DEFAULT_MAX_DEPTH;
pub use value::MAX_DEPTH_LIMIT;
