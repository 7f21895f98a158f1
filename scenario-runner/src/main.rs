//! NTN Scenario Runner
//!
//! Loads a JSON scenario, drives it through the emulator and writes a JSON
//! report.
//!
//! Usage:
//!   ntn-scenario --scenario scenarios/leo_pass.json --output report.json
//!
//! Environment:
//!   NTN_SCENARIO       scenario path when --scenario is not given
//!   NTN_PASS_SECONDS   overrides every channel's pass length
//!   RUST_LOG           log filter

mod runner;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use ntn_emulator::EmulatorContext;
use runner::PassMode;
use scenario::Scenario;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SCENARIO: &str = "scenarios/leo_pass.json";

#[derive(Parser, Debug)]
#[command(
    name = "ntn-scenario",
    about = "Run an NTN link scenario against the channel emulator"
)]
struct Args {
    /// Scenario JSON file
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Report JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override every channel's pass length in seconds
    #[arg(long)]
    pass_seconds: Option<f64>,

    /// Run passes on the wall clock instead of stepping them
    #[arg(long)]
    realtime: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "scenario_runner=debug,ntn_emulator=debug,info"
    } else {
        "scenario_runner=info,ntn_emulator=info,warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = args
        .scenario
        .or_else(|| std::env::var("NTN_SCENARIO").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENARIO));
    let mut scenario = Scenario::load(&path)?;

    let pass_seconds = match args.pass_seconds {
        Some(seconds) => Some(seconds),
        None => std::env::var("NTN_PASS_SECONDS")
            .ok()
            .map(|v| v.parse::<f64>().context("NTN_PASS_SECONDS must be a number"))
            .transpose()?,
    };
    if let Some(seconds) = pass_seconds {
        scenario.override_pass_seconds(seconds);
        scenario.validate()?;
    }

    let mode = if args.realtime {
        PassMode::Realtime
    } else {
        PassMode::Stepped
    };

    let ctx = EmulatorContext::new();
    let report = runner::run(&ctx, &scenario, mode).await?;

    match &args.output {
        Some(output) => {
            let writer = BufWriter::new(File::create(output)?);
            serde_json::to_writer_pretty(writer, &report)?;
            info!("Report written to {:?}", output);
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
