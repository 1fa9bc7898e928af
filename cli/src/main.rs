//! case-sim: run the reference hospital simulation
//!
//! Usage: `case-sim [--config FILE] [--horizon HOURS] [--seed N]
//! [--planner lead-time|slot] [--lead HOURS] [--capacity N]`
//!
//! Prints a JSON report with the score components, case counts and the
//! event-log digest. Logging goes to stderr; `RUST_LOG` overrides
//! `--log-level`.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use case_sim_core::{Evaluation, HealthcareProblem, PlannerConfig, Simulator};
use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use serde::Serialize;

use config::{CliError, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "case-sim", version)]
#[command(about = "Run the reference hospital simulation and print its score")]
struct Args {
    /// JSON run configuration (simulator, problem and planner sections)
    #[arg(long, env = "CASE_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Simulated hours to run
    #[arg(long)]
    horizon: Option<f64>,

    /// Seed for the hospital's random streams
    #[arg(long)]
    seed: Option<u64>,

    /// Planner for intake moments
    #[arg(long, value_enum)]
    planner: Option<PlannerKind>,

    /// Planner lead time in hours
    #[arg(long)]
    lead: Option<f64>,

    /// Patients per planning slot (slot planner only)
    #[arg(long)]
    capacity: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PlannerKind {
    LeadTime,
    Slot,
}

#[derive(Debug, Serialize)]
struct RunReport {
    config_fingerprint: String,
    planner: PlannerConfig,
    seed: u64,
    now: f64,
    events_dispatched: usize,
    cases_finalized: usize,
    cases_active: usize,
    mean_cycle_time: Option<f64>,
    score: f64,
    evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_log_digest: Option<String>,
}

/// Command-line flags win over the config file.
fn apply_overrides(mut config: RunConfig, args: &Args) -> RunConfig {
    if let Some(horizon) = args.horizon {
        config.simulator.horizon = horizon;
    }
    if let Some(seed) = args.seed {
        config.problem.seed = seed;
    }

    let (kind, lead, capacity) = match config.planner {
        PlannerConfig::LeadTime { lead } => (PlannerKind::LeadTime, lead, 1),
        PlannerConfig::Slot { lead, capacity } => (PlannerKind::Slot, lead, capacity),
    };
    let lead = args.lead.unwrap_or(lead);
    config.planner = match args.planner.unwrap_or(kind) {
        PlannerKind::LeadTime => PlannerConfig::LeadTime { lead },
        PlannerKind::Slot => PlannerConfig::Slot {
            lead,
            capacity: args.capacity.unwrap_or(capacity),
        },
    };
    config
}

fn run(args: &Args) -> Result<RunReport, CliError> {
    let config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let config = apply_overrides(config, args);
    let fingerprint = config.fingerprint()?;
    info!(
        "Config {} (seed {}, horizon {} h, planner {:?})",
        &fingerprint[..12],
        config.problem.seed,
        config.simulator.horizon,
        config.planner
    );

    let problem = HealthcareProblem::new(config.problem.clone())?;
    let mut simulator = Simulator::new(
        config.simulator.clone(),
        Box::new(problem),
        config.planner.build(),
    )?;
    let evaluation = simulator.run()?;

    let cases = simulator.cases();
    let finalized = cases.finalized_count();
    let event_log_digest = if config.simulator.record_event_log {
        Some(simulator.event_log().digest()?)
    } else {
        None
    };

    Ok(RunReport {
        config_fingerprint: fingerprint,
        planner: config.planner,
        seed: config.problem.seed,
        now: simulator.now(),
        events_dispatched: simulator.events_dispatched(),
        cases_finalized: finalized,
        cases_active: cases.active_count(),
        mean_cycle_time: (finalized > 0).then(|| cases.total_cycle_time() / finalized as f64),
        score: evaluation.total(),
        evaluation,
        event_log_digest,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let report = match run(&args) {
        Ok(report) => report,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Cannot render report: {err}");
            ExitCode::FAILURE
        }
    }
}
