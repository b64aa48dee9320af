#![cfg(unix)]

mod common;

use common::Fixture;
use json_conformance::build_filter;
use json_conformance::run_corpus;
use json_conformance::CompareOptions;
use json_conformance::DriverOptions;
use json_conformance::DuplicateKeys;
use json_conformance::HarnessError;
use json_conformance::RunnerConfig;
use json_conformance::SkipPolicy;
use json_conformance::Verdict;
use std::time::Duration;

fn verdict_of<'a>(report: &'a json_conformance::Report, id: &str) -> &'a Verdict {
  &report
    .results()
    .iter()
    .find(|result| result.id == id)
    .unwrap_or_else(|| panic!("no result for {id}"))
    .verdict
}

#[test]
fn numeric_reformatting_passes() {
  let fixture = Fixture::new();
  fixture.add("y_number.json", "1");

  let mut sink = Vec::new();
  let report = run_corpus(&DriverOptions::new(fixture.corpus(), fixture.runner()), &mut sink).unwrap();
  assert_eq!(verdict_of(&report, "y_number.json"), &Verdict::Pass);
  assert_eq!(report.exit_code(), 0);
}

#[test]
fn rejected_invalid_document_passes() {
  let fixture = Fixture::new();
  fixture.add("n_trailing.json", "{,}");

  let mut sink = Vec::new();
  let report = run_corpus(&DriverOptions::new(fixture.corpus(), fixture.runner()), &mut sink).unwrap();
  assert_eq!(verdict_of(&report, "n_trailing.json"), &Verdict::Pass);
  assert_eq!(report.failures(), 0);
}

#[test]
fn duplicate_keys_depend_on_oracle_policy() {
  let fixture = Fixture::new();
  fixture.add("y_dup_keys.json", "{\"a\":1,\"a\":2}");

  let run_with = |duplicate_keys| {
    let mut opts = DriverOptions::new(fixture.corpus(), fixture.runner());
    opts.compare = CompareOptions {
      duplicate_keys,
      ..CompareOptions::default()
    };
    let mut sink = Vec::new();
    run_corpus(&opts, &mut sink).unwrap()
  };

  let report = run_with(DuplicateKeys::LastWins);
  assert_eq!(verdict_of(&report, "y_dup_keys.json"), &Verdict::Pass);

  let report = run_with(DuplicateKeys::FirstWins);
  assert!(verdict_of(&report, "y_dup_keys.json").is_failure());

  let report = run_with(DuplicateKeys::Reject);
  match verdict_of(&report, "y_dup_keys.json") {
    Verdict::Fail(reason) => assert!(reason.contains("duplicate key"), "{reason}"),
    other => panic!("expected failure, got {other:?}"),
  }
}

#[test]
fn hang_crashes_and_fails_the_run() {
  let fixture = Fixture::new();
  fixture.add("i_number.json", "1");
  fixture.add("y_fine.json", "[true]");

  let opts = DriverOptions::new(
    fixture.corpus(),
    fixture.runner().with_timeout(Duration::from_secs(1)),
  );
  let mut sink = Vec::new();
  let report = run_corpus(&opts, &mut sink).unwrap();

  assert_eq!(
    verdict_of(&report, "i_number.json"),
    &Verdict::Crash("timed out after 1000ms".to_string())
  );
  assert_eq!(verdict_of(&report, "y_fine.json"), &Verdict::Pass);
  assert!(report.failures() >= 1);
  assert_ne!(report.exit_code(), 0);
}

#[test]
fn failures_are_reported_as_they_happen_and_summarized() {
  let fixture = Fixture::new();
  fixture.add("n_accepted_anyway_mismatch.json", "[1,2]");
  fixture.add("y_mismatch.json", "[1,2]");
  fixture.add("y_ok.json", "{\"k\":\"v\"}");
  fixture.add("y_segv.json", "[]");
  fixture.add("i_garbage.json", "{}");

  let mut sink = Vec::new();
  let report = run_corpus(&DriverOptions::new(fixture.corpus(), fixture.runner()), &mut sink).unwrap();
  let output = String::from_utf8(sink).unwrap();

  let lines: Vec<_> = output.lines().collect();
  assert_eq!(
    lines,
    vec![
      "FAIL i_garbage.json: round-trip mismatch: round-tripped output could not be decoded: expected `null` at offset 0",
      "FAIL n_accepted_anyway_mismatch.json: expected rejection, got acceptance",
      "FAIL y_mismatch.json: round-trip mismatch at $[0]: 1.0 != 2.0",
      "CRASH y_segv.json: killed by SIGSEGV (signal 11)",
      "1 passed, 3 failed, 1 crashed, 0 skipped (4 failures)",
    ]
  );
  assert_eq!(report.summary().total, 5);
  assert_eq!(report.exit_code(), 1);
}

#[test]
fn invalid_text_follows_skip_policy() {
  let fixture = Fixture::new();
  fixture.add("y_latin1.json", b"[\"\xe9\"]");

  let mut sink = Vec::new();
  let lenient = run_corpus(&DriverOptions::new(fixture.corpus(), fixture.runner()), &mut sink).unwrap();
  assert!(matches!(
    verdict_of(&lenient, "y_latin1.json"),
    Verdict::Skip(_)
  ));
  assert_eq!(lenient.exit_code(), 0);

  let mut opts = DriverOptions::new(fixture.corpus(), fixture.runner());
  opts.skip_policy = SkipPolicy::Strict;
  let strict = run_corpus(&opts, &mut sink).unwrap();
  assert!(matches!(
    verdict_of(&strict, "y_latin1.json"),
    Verdict::Crash(_)
  ));
  assert_eq!(strict.exit_code(), 1);
}

#[test]
fn filter_restricts_the_corpus() {
  let fixture = Fixture::new();
  fixture.add("y_keep.json", "[]");
  fixture.add("y_mismatch.json", "[1,2]");

  let mut opts = DriverOptions::new(fixture.corpus(), fixture.runner());
  opts.filter = build_filter(Some("*keep*")).unwrap();
  let mut sink = Vec::new();
  let report = run_corpus(&opts, &mut sink).unwrap();
  assert_eq!(report.summary().total, 1);
  assert_eq!(report.exit_code(), 0);
}

#[test]
fn empty_selection_is_an_error_unless_allowed() {
  let fixture = Fixture::new();
  let mut opts = DriverOptions::new(fixture.corpus(), fixture.runner());
  let mut sink = Vec::new();
  let err = run_corpus(&opts, &mut sink).unwrap_err();
  assert!(matches!(err, HarnessError::Corpus(_)));

  opts.allow_empty = true;
  let report = run_corpus(&opts, &mut sink).unwrap();
  assert_eq!(report.summary().total, 0);
  assert_eq!(report.exit_code(), 0);
}

#[test]
fn launch_failure_aborts_the_run() {
  let fixture = Fixture::new();
  fixture.add("y_a.json", "[]");
  fixture.add("y_b.json", "[]");

  let opts = DriverOptions::new(
    fixture.corpus(),
    RunnerConfig::new(fixture.path().join("missing-program")),
  );
  let mut sink = Vec::new();
  let err = run_corpus(&opts, &mut sink).unwrap_err();
  assert!(matches!(err, HarnessError::Launch { .. }));
}

#[test]
fn parallel_run_matches_sequential_run() {
  let fixture = Fixture::new();
  for idx in 0..12 {
    fixture.add(&format!("y_doc{idx:02}.json"), format!("[{idx}, {{\"n\": {idx}}}]"));
  }
  fixture.add("n_reject.json", "[");
  fixture.add("y_mismatch.json", "[1,2]");
  fixture.add("y_segv.json", "[]");

  let sequential = {
    let mut sink = Vec::new();
    run_corpus(&DriverOptions::new(fixture.corpus(), fixture.runner()), &mut sink).unwrap()
  };
  let parallel = {
    let mut opts = DriverOptions::new(fixture.corpus(), fixture.runner());
    opts.jobs = 4;
    let mut sink = Vec::new();
    run_corpus(&opts, &mut sink).unwrap()
  };

  let ids = |report: &json_conformance::Report| {
    report
      .results()
      .iter()
      .map(|result| (result.id.clone(), result.verdict.clone()))
      .collect::<Vec<_>>()
  };
  assert_eq!(ids(&sequential), ids(&parallel));
  assert_eq!(sequential.summary(), parallel.summary());
  assert_eq!(parallel.failures(), 2);
}
