//! Volduel CLI
//!
//! Usage:
//!   volduel simulate --cycles 48 --stakers 12 --seed 7
//!   volduel simulate --config volduel.toml --output summary.json
//!   volduel check-config --config volduel.toml
//!
//! Without `--config`, the engine config comes from `VOLDUEL_CONFIG`
//! (default `volduel.toml`) plus `VOLDUEL_*` overrides.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use volduel_backend::pool::clock::parse_timestamp;
use volduel_backend::pool::EngineConfig;
use volduel_backend::sim::{run_simulation, SimulationConfig};

#[derive(Parser, Debug)]
#[command(name = "volduel")]
#[command(about = "Parimutuel volatility pool engine")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a seeded simulation and print a JSON summary
    Simulate {
        #[arg(long, default_value = "24")]
        cycles: u64,

        #[arg(long, default_value = "8")]
        stakers: usize,

        #[arg(long, default_value = "42", env = "VOLDUEL_SEED")]
        seed: u64,

        /// Engine config TOML
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the summary here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "0.05")]
        late_settle_probability: f64,

        /// RFC 3339 start time; the run begins at the next cycle boundary
        #[arg(long, default_value = "2026-01-24T00:00:00Z")]
        start: String,
    },

    /// Load and validate an engine config
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    match args.command {
        Commands::Simulate {
            cycles,
            stakers,
            seed,
            config,
            output,
            late_settle_probability,
            start,
        } => {
            let engine_config = load_config(config.as_deref())?;
            let start_time = parse_timestamp(&start)
                .with_context(|| format!("Invalid --start timestamp '{}'", start))?;
            let sim = SimulationConfig {
                cycles,
                stakers,
                seed,
                start_time,
                late_settle_probability,
                ..SimulationConfig::default()
            };
            let summary = run_simulation(engine_config, sim)?;
            let json = serde_json::to_string_pretty(&summary)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "Summary written");
                }
                None => println!("{}", json),
            }
            if !summary.audit.is_clean() {
                anyhow::bail!(
                    "Audit reported {} violations",
                    summary.audit.violations.len()
                );
            }
        }
        Commands::CheckConfig { config } => {
            let engine_config = load_config(config.as_deref())?;
            engine_config.validate()?;
            let plan = engine_config
                .sampling_plan()
                .context("Config validated without a sampling plan")?;
            println!("Config OK");
            println!(
                "  cycle:     {}s ({}s staking + {}s measuring)",
                engine_config.cycle_duration_secs(),
                engine_config.staking_window_secs,
                engine_config.prediction_window_secs
            );
            println!(
                "  sampling:  {} steps of {}s",
                plan.samples(),
                plan.step_secs()
            );
            println!(
                "  settle:    +{}s finality, void after +{}s",
                engine_config.finality_delay_secs, engine_config.resolve_deadline_secs
            );
            println!(
                "  incentive: bounty {} bps, fee {} bps ({})",
                engine_config.bounty_bps,
                engine_config.fee_bps,
                engine_config
                    .fee_recipient
                    .as_deref()
                    .unwrap_or("no recipient, fee waived")
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(EngineConfig::from_env()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volduel_backend=info,volduel=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
