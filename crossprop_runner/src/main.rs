use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use crossprop::{value_gen::fresh_seed, FailurePolicy, GeneratorConfig, PropertyConfig, ReturnMode};
use crossprop_runner::{exit_code, run_properties, RunOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for setup and usage errors, kept apart from falsified (1) and
/// faulted (2).
const SETUP_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliOptions {
    /// Python script defining the target functions
    #[arg(long, value_name = "SCRIPT")]
    script: PathBuf,

    /// Function to check; can be repeated (default: every public function)
    #[arg(long = "function", short = 'f', value_name = "NAME")]
    functions: Vec<String>,

    /// Number of generated trials per property; the builtin regression
    /// cases run on top of these unless --no-builtin-regressions is given
    #[arg(long, short = 'n', default_value = "10")]
    trials: usize,

    /// Random seed (default: a fresh one, printed in the report)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum nesting depth of generated values
    #[arg(long, default_value = "1")]
    max_depth: usize,

    /// Maximum number of entries in a generated object or array
    #[arg(long, default_value = "4")]
    max_len: usize,

    /// Keep running after the first failure
    #[arg(long = "continue")]
    keep_going: bool,

    /// Shrink failing generated values
    #[arg(long)]
    shrink: bool,

    /// Accept non-str results by converting them to JSON
    #[arg(long)]
    stringify: bool,

    /// Skip the builtin regression cases
    #[arg(long)]
    no_builtin_regressions: bool,

    /// File of regression inputs, one JSON text per line
    #[arg(long, value_name = "FILE")]
    regressions: Option<PathBuf>,

    /// Append failing inputs to the regression file
    #[arg(long, requires = "regressions")]
    record_failures: bool,

    /// JSON suite file listing properties; replaces --function
    #[arg(long, value_name = "FILE", conflicts_with = "functions")]
    suite: Option<PathBuf>,

    /// Write all reports as JSON to this file
    #[arg(long, value_name = "OUTPUT_PATH")]
    output: Option<PathBuf>,

    /// Set stderr log level; 1 is warnings only, 2 is info, 3 is debug (default: 1)
    #[arg(long, short = 'l', default_value = "1")]
    log_level: u32,
}

impl CliOptions {
    fn to_run_options(&self) -> RunOptions {
        RunOptions {
            script: self.script.clone(),
            functions: self.functions.clone(),
            suite: self.suite.clone(),
            base: PropertyConfig {
                trials: self.trials,
                seed: self.seed.unwrap_or_else(fresh_seed),
                generator: GeneratorConfig {
                    max_depth: self.max_depth,
                    max_collection_len: self.max_len,
                    ..GeneratorConfig::default()
                },
                failure_policy: if self.keep_going {
                    FailurePolicy::Continue
                } else {
                    FailurePolicy::HaltOnFirst
                },
                shrink: self.shrink,
                ..PropertyConfig::default()
            },
            return_mode: if self.stringify {
                ReturnMode::Stringify
            } else {
                ReturnMode::Strict
            },
            builtin_regressions: !self.no_builtin_regressions,
            regressions: self.regressions.clone(),
            record_failures: self.record_failures,
        }
    }
}

fn init_logging(log_level: u32) {
    let filter = match log_level {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(opts: &CliOptions) -> Result<u8> {
    let reports = run_properties(&opts.to_run_options())?;
    for report in &reports {
        print!("{report}");
    }
    if let Some(output) = &opts.output {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(exit_code(&reports))
}

fn main() -> ExitCode {
    let opts = match CliOptions::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too, on stdout
            return if e.use_stderr() {
                ExitCode::from(SETUP_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(opts.log_level);
    match run(&opts) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(SETUP_ERROR)
        }
    }
}
