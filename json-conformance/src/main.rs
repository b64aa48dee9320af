use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use json_conformance::build_filter;
use json_conformance::exit_code_for;
use json_conformance::report::write_json_report;
use json_conformance::run_corpus;
use json_conformance::run_one;
use json_conformance::CompareOptions;
use json_conformance::DriverOptions;
use json_conformance::DuplicateKeys;
use json_conformance::NumberMode;
use json_conformance::RunnerConfig;
use json_conformance::SingleOptions;
use json_conformance::SkipPolicy;
use json_conformance::StderrMode;
use json_conformance::DEFAULT_MAX_DEPTH;
use json_conformance::EXIT_CRASH;
use json_conformance::MAX_DEPTH_LIMIT;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(version, about = "Round-trip conformance harness for JSON test programs")]
struct Cli {
  /// Emit harness tracing to stderr (filter with RUST_LOG).
  #[arg(long, global = true)]
  trace: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run every document in a corpus directory and print a summary.
  Run(RunArgs),
  /// Check a single document; the verdict is the exit code.
  Single(SingleArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
  /// Directory of documents; `y` and `n` file name prefixes mark documents
  /// that must be accepted or rejected.
  #[arg(long)]
  corpus: PathBuf,

  /// Glob or regex over corpus-relative ids.
  #[arg(long)]
  filter: Option<String>,

  /// Number of documents to check concurrently.
  #[arg(long, default_value_t = 1)]
  jobs: usize,

  /// Also write a JSON report to this path.
  #[arg(long, value_name = "PATH")]
  json: Option<PathBuf>,

  /// Succeed when the filter selects no documents.
  #[arg(long)]
  allow_empty: bool,

  #[command(flatten)]
  program: ProgramArgs,

  #[command(flatten)]
  oracle: OracleArgs,
}

#[derive(Args, Debug)]
struct SingleArgs {
  /// Exit code for crashes, timeouts and round-trip mismatches.
  #[arg(long, default_value_t = EXIT_CRASH)]
  crash_code: u8,

  #[command(flatten)]
  program: ProgramArgs,

  #[command(flatten)]
  oracle: OracleArgs,

  /// Document to check.
  path: PathBuf,
}

#[derive(Args, Debug)]
struct ProgramArgs {
  /// Program under test; it receives the document path as its last argument.
  #[arg(long)]
  program: PathBuf,

  /// Argument passed to the program before the document path (repeatable).
  #[arg(long = "program-arg", value_name = "ARG", allow_hyphen_values = true)]
  program_args: Vec<OsString>,

  /// Seconds before a running program is killed and reported as crashed.
  #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
  timeout_secs: u64,

  /// Timeout in milliseconds, for budgets finer than a second.
  #[arg(long, value_name = "MS", conflicts_with = "timeout_secs")]
  timeout_ms: Option<u64>,

  /// Forward the program's stderr instead of discarding it.
  #[arg(long)]
  show_stderr: bool,
}

impl ProgramArgs {
  fn timeout(&self) -> Duration {
    match self.timeout_ms {
      Some(ms) => Duration::from_millis(ms),
      None => Duration::from_secs(self.timeout_secs),
    }
  }

  fn runner_config(&self) -> RunnerConfig {
    RunnerConfig::new(&self.program)
      .with_args(self.program_args.iter().cloned())
      .with_timeout(self.timeout())
      .with_stderr(if self.show_stderr {
        StderrMode::Inherit
      } else {
        StderrMode::Null
      })
  }
}

#[derive(Args, Debug)]
struct OracleArgs {
  /// How to treat an original document the oracle cannot read as text.
  #[arg(long, value_enum, default_value_t = SkipPolicyArg::Lenient)]
  skip_policy: SkipPolicyArg,

  /// How numbers are compared.
  #[arg(long, value_enum, default_value_t = NumbersArg::Float)]
  numbers: NumbersArg,

  /// What a repeated object key means to the oracle.
  #[arg(long, value_enum, default_value_t = DuplicateKeysArg::LastWins)]
  duplicate_keys: DuplicateKeysArg,

  /// Deepest nesting the oracle will parse.
  #[arg(
    long,
    default_value_t = DEFAULT_MAX_DEPTH as u64,
    value_parser = clap::value_parser!(u64).range(1..=MAX_DEPTH_LIMIT as u64)
  )]
  max_depth: u64,
}

impl OracleArgs {
  fn compare_options(&self) -> CompareOptions {
    CompareOptions {
      numbers: match self.numbers {
        NumbersArg::Float => NumberMode::Float,
        NumbersArg::IntegerPreserving => NumberMode::IntegerPreserving,
      },
      duplicate_keys: match self.duplicate_keys {
        DuplicateKeysArg::LastWins => DuplicateKeys::LastWins,
        DuplicateKeysArg::FirstWins => DuplicateKeys::FirstWins,
        DuplicateKeysArg::Reject => DuplicateKeys::Reject,
      },
      max_depth: self.max_depth as usize,
    }
  }

  fn skip_policy(&self) -> SkipPolicy {
    match self.skip_policy {
      SkipPolicyArg::Lenient => SkipPolicy::Lenient,
      SkipPolicyArg::Strict => SkipPolicy::Strict,
    }
  }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SkipPolicyArg {
  /// Skip the round trip.
  Lenient,
  /// Report a crash.
  Strict,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NumbersArg {
  /// Every number is a double; `1` equals `1.0`.
  Float,
  /// Integers are exact and never equal a fractional spelling.
  IntegerPreserving,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DuplicateKeysArg {
  LastWins,
  FirstWins,
  Reject,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.trace);

  match cli.command {
    Command::Run(args) => match run(args) {
      Ok(code) => ExitCode::from(code),
      Err(err) => {
        eprintln!("error: {err:#}");
        ExitCode::from(1)
      }
    },
    Command::Single(args) => {
      let crash_code = args.crash_code;
      let opts = SingleOptions {
        runner: args.program.runner_config(),
        compare: args.oracle.compare_options(),
        skip_policy: args.oracle.skip_policy(),
        crash_code,
      };
      ExitCode::from(exit_code_for(run_one(&args.path, &opts), crash_code))
    }
  }
}

fn run(args: RunArgs) -> Result<u8> {
  let filter = build_filter(args.filter.as_deref())?;
  let options = DriverOptions {
    corpus: args.corpus,
    filter,
    runner: args.program.runner_config(),
    compare: args.oracle.compare_options(),
    skip_policy: args.oracle.skip_policy(),
    jobs: args.jobs.max(1),
    allow_empty: args.allow_empty,
  };

  let mut stdout = io::stdout();
  let report = run_corpus(&options, &mut stdout)?;

  if let Some(path) = args.json {
    write_json_report(&path, &report)
      .with_context(|| format!("write JSON report to {}", path.display()))?;
  }

  Ok(report.exit_code())
}

fn init_tracing(enable: bool) {
  if !enable {
    return;
  }

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr);
  if let Err(err) = builder.try_init() {
    eprintln!("failed to install tracing subscriber: {err}");
  }
}
