use crate::HarnessError;
use crate::Result;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::ChildStdout;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::warn;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Where the child's standard error goes. It never takes part in a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrMode {
  #[default]
  Null,
  Inherit,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
  pub program: PathBuf,
  /// Fixed arguments placed before the document path.
  pub args: Vec<OsString>,
  pub timeout: Duration,
  pub stderr: StderrMode,
}

impl RunnerConfig {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    RunnerConfig {
      program: program.into(),
      args: Vec::new(),
      timeout: DEFAULT_TIMEOUT,
      stderr: StderrMode::default(),
    }
  }

  pub fn with_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args = args.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_stderr(mut self, stderr: StderrMode) -> Self {
    self.stderr = stderr;
    self
  }
}

/// How one invocation of the program under test ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  /// Exit status 0; `output` is everything written to stdout.
  Accepted { output: Vec<u8> },
  /// Nonzero exit status: the library rejected the document.
  Rejected { code: i32 },
  /// The deadline passed and the child was killed.
  TimedOut { after: Duration },
  /// Terminated by a signal the child did not handle.
  Signaled { signal: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abnormal {
  Timeout(Duration),
  Signaled(Option<i32>),
}

impl RunOutcome {
  pub fn accepted(&self) -> bool {
    matches!(self, RunOutcome::Accepted { .. })
  }

  pub fn abnormal(&self) -> Option<Abnormal> {
    match self {
      RunOutcome::TimedOut { after } => Some(Abnormal::Timeout(*after)),
      RunOutcome::Signaled { signal } => Some(Abnormal::Signaled(*signal)),
      RunOutcome::Accepted { .. } | RunOutcome::Rejected { .. } => None,
    }
  }
}

impl fmt::Display for Abnormal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Abnormal::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
      Abnormal::Signaled(Some(signal)) => match signal_name(*signal) {
        Some(name) => write!(f, "killed by {name} (signal {signal})"),
        None => write!(f, "killed by signal {signal}"),
      },
      Abnormal::Signaled(None) => f.write_str("terminated abnormally"),
    }
  }
}

/// Names for the signals whose numbers agree across Linux and macOS.
pub fn signal_name(signal: i32) -> Option<&'static str> {
  let name = match signal {
    1 => "SIGHUP",
    2 => "SIGINT",
    3 => "SIGQUIT",
    4 => "SIGILL",
    5 => "SIGTRAP",
    6 => "SIGABRT",
    8 => "SIGFPE",
    9 => "SIGKILL",
    11 => "SIGSEGV",
    13 => "SIGPIPE",
    14 => "SIGALRM",
    15 => "SIGTERM",
    _ => return None,
  };
  Some(name)
}

/// Runs the program under test against one document at a time.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
  config: RunnerConfig,
}

impl ProcessRunner {
  pub fn new(config: RunnerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &RunnerConfig {
    &self.config
  }

  /// Spawns the program with `path` as its last argument and waits for it,
  /// at most until the configured timeout.
  ///
  /// The child runs in its own process group and the deadline also covers
  /// reading its stdout, so descendants that hold the pipe open cannot stall
  /// the caller. The whole group is killed once the run is over.
  ///
  /// A program that cannot be started at all yields [`HarnessError::Launch`];
  /// every child that was started is reaped before this returns.
  pub fn run(&self, path: &Path) -> Result<RunOutcome> {
    let mut cmd = Command::new(&self.config.program);
    cmd.args(&self.config.args);
    cmd.arg(path);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(match self.config.stderr {
      StderrMode::Null => Stdio::null(),
      StderrMode::Inherit => Stdio::inherit(),
    });
    own_process_group(&mut cmd);

    let deadline = Instant::now() + self.config.timeout;
    let mut child = cmd.spawn().map_err(|source| HarnessError::Launch {
      program: self.config.program.clone(),
      source,
    })?;

    let reader = match child.stdout.take() {
      Some(stdout) => spawn_reader(stdout),
      None => {
        kill_and_reap(&mut child);
        return Err(HarnessError::Internal(
          "child stdout was not captured".to_string(),
        ));
      }
    };

    let status = match wait_until(&mut child, deadline) {
      Ok(Some(status)) => status,
      Ok(None) => {
        kill_and_reap(&mut child);
        return Ok(self.timed_out(path, &reader));
      }
      Err(err) => {
        kill_and_reap(&mut child);
        return Err(err.into());
      }
    };

    // A descendant that inherited stdout can keep the pipe open after the
    // child itself has exited.
    let remaining = deadline
      .saturating_duration_since(Instant::now())
      .max(DRAIN_GRACE);
    let read = match reader.recv_timeout(remaining) {
      Ok(read) => read,
      Err(RecvTimeoutError::Timeout) => {
        kill_process_group(&child);
        return Ok(self.timed_out(path, &reader));
      }
      Err(RecvTimeoutError::Disconnected) => {
        kill_process_group(&child);
        return Err(HarnessError::Internal("stdout reader panicked".to_string()));
      }
    };
    kill_process_group(&child);
    let output = read?;

    let outcome = outcome_from_status(status, output);
    debug!(path = %path.display(), %status, "program finished");
    Ok(outcome)
  }

  /// Every process in the group is dead by now, so the reader sees the pipe
  /// close almost immediately.
  fn timed_out(&self, path: &Path, reader: &Receiver<io::Result<Vec<u8>>>) -> RunOutcome {
    let _ = reader.recv_timeout(DRAIN_GRACE);
    warn!(
      path = %path.display(),
      timeout_ms = self.config.timeout.as_millis() as u64,
      "program timed out; killed"
    );
    RunOutcome::TimedOut {
      after: self.config.timeout,
    }
  }
}

fn spawn_reader(mut stdout: ChildStdout) -> Receiver<io::Result<Vec<u8>>> {
  let (tx, rx) = mpsc::channel();
  thread::spawn(move || {
    let mut buf = Vec::new();
    let read = stdout.read_to_end(&mut buf).map(|_| buf);
    let _ = tx.send(read);
  });
  rx
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
  loop {
    match child.try_wait()? {
      Some(status) => return Ok(Some(status)),
      None => {
        let now = Instant::now();
        if now >= deadline {
          return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
      }
    }
  }
}

fn kill_and_reap(child: &mut Child) {
  kill_process_group(child);
  if child.try_wait().ok().flatten().is_none() {
    let _ = child.kill();
  }
  let _ = child.wait();
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
  use std::os::unix::process::CommandExt;
  cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// The child leads its own process group, so its pid is the group id.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
  let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
    return;
  };
  // SAFETY: kill(2) takes no pointers; a group that is already gone gives ESRCH.
  unsafe {
    libc::kill(-pgid, libc::SIGKILL);
  }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn outcome_from_status(status: ExitStatus, output: Vec<u8>) -> RunOutcome {
  match status.code() {
    Some(0) => RunOutcome::Accepted { output },
    Some(code) => RunOutcome::Rejected { code },
    None => {
      let signal = termination_signal(&status);
      warn!(?signal, "program terminated by signal");
      RunOutcome::Signaled { signal }
    }
  }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
  use std::os::unix::process::ExitStatusExt;
  status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
  None
}
