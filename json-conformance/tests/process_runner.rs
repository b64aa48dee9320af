#![cfg(unix)]

mod common;

use common::Fixture;
use json_conformance::Abnormal;
use json_conformance::HarnessError;
use json_conformance::ProcessRunner;
use json_conformance::RunOutcome;
use json_conformance::RunnerConfig;
use std::time::Duration;
use std::time::Instant;

#[test]
fn acceptance_captures_stdout() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_object.json", "{\"a\":[1,2]}");
  let outcome = ProcessRunner::new(fixture.runner()).run(&doc).unwrap();
  assert_eq!(
    outcome,
    RunOutcome::Accepted {
      output: b"{\"a\":[1,2]}".to_vec()
    }
  );
}

#[test]
fn nonzero_exit_is_rejection() {
  let fixture = Fixture::new();
  let doc = fixture.add("n_trailing.json", "{,}");
  let outcome = ProcessRunner::new(fixture.runner()).run(&doc).unwrap();
  assert_eq!(outcome, RunOutcome::Rejected { code: 1 });
  assert_eq!(outcome.abnormal(), None);

  let doc = fixture.add("i_exit3.json", "[]");
  let outcome = ProcessRunner::new(fixture.runner()).run(&doc).unwrap();
  assert_eq!(outcome, RunOutcome::Rejected { code: 3 });
}

#[test]
fn hanging_program_times_out_and_is_killed() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_hang.json", "[]");
  let runner = ProcessRunner::new(fixture.runner().with_timeout(Duration::from_millis(300)));

  let start = Instant::now();
  let outcome = runner.run(&doc).unwrap();
  let elapsed = start.elapsed();

  assert_eq!(
    outcome,
    RunOutcome::TimedOut {
      after: Duration::from_millis(300)
    }
  );
  assert_eq!(
    outcome.abnormal(),
    Some(Abnormal::Timeout(Duration::from_millis(300)))
  );
  assert!(
    elapsed < Duration::from_secs(2),
    "runner blocked for {elapsed:?}"
  );
}

#[test]
fn background_process_holding_stdout_cannot_outlive_timeout() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_orphan.json", "1");
  let runner = ProcessRunner::new(fixture.runner().with_timeout(Duration::from_millis(500)));

  let start = Instant::now();
  let outcome = runner.run(&doc).unwrap();
  let elapsed = start.elapsed();

  assert_eq!(
    outcome,
    RunOutcome::TimedOut {
      after: Duration::from_millis(500)
    }
  );
  assert!(
    elapsed < Duration::from_secs(2),
    "runner blocked for {elapsed:?}"
  );
}

#[test]
fn background_process_without_stdout_does_not_delay_acceptance() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_detached.json", "[1]");
  let runner = ProcessRunner::new(fixture.runner());

  let start = Instant::now();
  let outcome = runner.run(&doc).unwrap();
  assert_eq!(
    outcome,
    RunOutcome::Accepted {
      output: b"[1]".to_vec()
    }
  );
  assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn signal_is_distinct_from_rejection() {
  let fixture = Fixture::new();
  let runner = ProcessRunner::new(fixture.runner());

  let doc = fixture.add("y_segv.json", "[]");
  assert_eq!(
    runner.run(&doc).unwrap(),
    RunOutcome::Signaled { signal: Some(11) }
  );

  let doc = fixture.add("y_abort.json", "[]");
  let outcome = runner.run(&doc).unwrap();
  assert_eq!(outcome, RunOutcome::Signaled { signal: Some(6) });
  assert!(!outcome.accepted());
}

#[test]
fn large_output_does_not_stall_the_child() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_loud.json", "[1]");
  let outcome = ProcessRunner::new(fixture.runner()).run(&doc).unwrap();
  match outcome {
    RunOutcome::Accepted { output } => {
      assert_eq!(output.len(), 300_000 + 3);
      assert!(output.ends_with(b"[1]"));
    }
    other => panic!("expected acceptance, got {other:?}"),
  }
}

#[test]
fn unlaunchable_program_is_a_setup_failure() {
  let fixture = Fixture::new();
  let doc = fixture.add("y_object.json", "{}");
  let runner = ProcessRunner::new(RunnerConfig::new(fixture.path().join("no-such-program")));
  let err = runner.run(&doc).unwrap_err();
  assert!(matches!(err, HarnessError::Launch { .. }), "{err}");
  assert!(err.is_fatal());
}
