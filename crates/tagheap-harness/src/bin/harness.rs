//! CLI entrypoint for the tagheap trace harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tagheap_harness::{ConformanceReport, HarnessError, TraceRunner, TraceSet};

/// Trace tooling for tagheap.
#[derive(Debug, Parser)]
#[command(name = "tagheap-harness")]
#[command(about = "Trace-driven conformance harness for tagheap")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a trace fixture file and report results.
    Run {
        /// Fixture JSON path.
        #[arg(long)]
        fixture: PathBuf,
        /// Campaign label stamped into the report.
        #[arg(long, default_value = "local")]
        campaign: String,
        /// Emit the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool, HarnessError> {
    match cli.command {
        Command::Run {
            fixture,
            campaign,
            json,
        } => {
            let set = TraceSet::from_file(&fixture)?;
            let runner = TraceRunner::new(campaign.clone());
            let results = runner.run(&set)?;
            let report = ConformanceReport::new(campaign, set.family.clone(), results);
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render_text());
            }
            Ok(report.all_passed())
        }
    }
}
