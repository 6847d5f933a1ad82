//! Headless lane battle runner.
//!
//! Runs matches without graphics, either unattended or controlled via JSON
//! on stdin/stdout.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read requests from stdin
//! cargo run -p lane_headless
//!
//! # Run an unattended match and print a summary
//! cargo run -p lane_headless -- run --ticks 3000 --seed 7
//!
//! # Check that repeated runs and a mid-match copy agree
//! cargo run -p lane_headless -- verify --ticks 3000 --seed 7 --runs 4
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON requests, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lane_core::config::SimConfig;
use lane_core::simulation::Simulator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lane_headless::{
    error::{load_config, Result},
    runner::{run_match, verify, HeadlessConfig, HeadlessRunner},
};

#[derive(Parser)]
#[command(name = "lane_headless")]
#[command(about = "Headless lane battle runner for scripted play and determinism checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a match with no player orders and print a JSON summary
    Run {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "3000")]
        ticks: u64,

        /// Combat random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// RON match configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Verify that repeated runs and a mid-match copy produce identical hashes
    Verify {
        /// Number of ticks per run
        #[arg(short, long, default_value = "3000")]
        ticks: u64,

        /// Combat random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Number of independent runs
        #[arg(short, long, default_value = "3")]
        runs: usize,

        /// RON match configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Drive a match with JSON-lines requests on stdin
    Play {
        /// Combat random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// RON match configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the full state after every tick request
        #[arg(long)]
        auto_state: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let outcome = match cli.command {
        Some(Commands::Run { ticks, seed, config }) => cmd_run(ticks, seed, config),
        Some(Commands::Verify {
            ticks,
            seed,
            runs,
            config,
        }) => cmd_verify(ticks, seed, runs, config),
        Some(Commands::Play {
            seed,
            config,
            auto_state,
        }) => cmd_play(seed, config, auto_state),
        None => cmd_play(0, None, false),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn sim_config(path: Option<PathBuf>) -> Result<SimConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading match configuration");
            load_config(&path)
        }
        None => Ok(SimConfig::default()),
    }
}

fn cmd_run(ticks: u64, seed: u64, config: Option<PathBuf>) -> Result<()> {
    let summary = run_match(sim_config(config)?, seed, ticks)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_verify(ticks: u64, seed: u64, runs: usize, config: Option<PathBuf>) -> Result<()> {
    let report = verify(&sim_config(config)?, seed, ticks, runs)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.deterministic {
        eprintln!("✓ {} runs of {ticks} ticks agree", report.run_hashes.len());
        Ok(())
    } else {
        eprintln!("✗ Hashes diverged");
        std::process::exit(1);
    }
}

fn cmd_play(seed: u64, config: Option<PathBuf>, auto_state: bool) -> Result<()> {
    let sim = Simulator::with_config(sim_config(config)?, seed)?;
    let mut runner = HeadlessRunner::with_simulator(
        sim,
        HeadlessConfig {
            auto_state_output: auto_state,
        },
    );
    let stdin = io::stdin();
    runner.run(stdin.lock(), io::stdout().lock())
}
