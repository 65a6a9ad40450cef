use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::analytics::Metric;
use crate::config::{load_config, DashboardConfig};
use crate::error::{Error, Result};
use crate::models::Algorithm;

#[derive(Parser, Debug)]
#[command(name = "sched-dash", about = "Inspect and compare CPU scheduling runs")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the supported algorithm ids.
    ListAlgorithms,
    /// Rank stored runs read from a JSON file.
    Compare(CompareArgs),
    /// Rebuild a session from a recorded event log.
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    #[arg(long)]
    pub runs: PathBuf,
    #[arg(long, help = "Also print chart rows with scaled throughput")]
    pub chart: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    #[arg(long)]
    pub events: PathBuf,
    #[arg(long, value_parser = parse_algorithm)]
    pub algo: Option<Algorithm>,
    #[arg(long)]
    pub quantum: Option<u64>,
    #[arg(long, help = "Seed synthesized ids for reproducible output")]
    pub salt: Option<u32>,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(clap::Args, Debug)]
pub struct CommonArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    pub format: FormatArg,
    #[arg(
        long = "weight",
        value_name = "METRIC=WEIGHT",
        value_parser = parse_weight
    )]
    pub weights: Vec<(Metric, f64)>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Human,
    Summary,
    Json,
}

pub fn parse_args() -> Result<Args> {
    Args::try_parse().map_err(|e| Error::Cli(e.to_string()))
}

/// Loads the config file (or defaults) and applies the flag overrides.
pub fn build_config(common: &CommonArgs) -> Result<DashboardConfig> {
    let mut config = match &common.config {
        Some(path) => load_config(path)?,
        None => DashboardConfig::default(),
    };
    for (metric, weight) in &common.weights {
        config
            .analytics
            .weights
            .insert(metric.as_str().to_string(), *weight);
    }
    config.validate()?;
    Ok(config)
}

pub fn build_replay_config(args: &ReplayArgs) -> Result<DashboardConfig> {
    let mut config = build_config(&args.common)?;
    if let Some(algorithm) = args.algo {
        config.session.default_algorithm = algorithm;
    }
    if let Some(quantum) = args.quantum {
        config.session.time_quantum = quantum;
    }
    if args.salt.is_some() {
        config.reconciler.id_salt = args.salt;
    }
    config.validate()?;
    Ok(config)
}

fn parse_algorithm(input: &str) -> std::result::Result<Algorithm, String> {
    input.parse().map_err(|err: Error| err.to_string())
}

fn parse_weight(input: &str) -> std::result::Result<(Metric, f64), String> {
    let (name, weight) = input
        .split_once('=')
        .ok_or_else(|| format!("expected METRIC=WEIGHT, got '{}'", input))?;
    let metric = name
        .trim()
        .parse::<Metric>()
        .map_err(|err| err.to_string())?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid weight in '{}'", input))?;
    Ok((metric, weight))
}
