mod report;
mod run_file;

use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;

use evolution_logic::{run_sweep, Simulation, SimulationConfig};
use run_file::RunFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable leaderboard and tables
    Summary,
    /// Full report as JSON
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "prisoners-evolution", version)]
#[command(about = "Evolutionary iterated Prisoner's Dilemma simulator")]
struct Args {
    /// JSON run file: {"config": {...}, "custom": [...], "sweep": {...}}
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u32>,

    /// Override the number of generations
    #[arg(long)]
    generations: Option<u32>,

    /// Override the population size
    #[arg(long)]
    population: Option<u64>,

    /// Override the noise (flip probability)
    #[arg(long)]
    noise: Option<f64>,

    /// Override the strategy selection (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    strategies: Option<Vec<String>>,

    /// Ignore any sweep section and run the base configuration once
    #[arg(long)]
    no_sweep: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// List available strategies and exit
    #[arg(long)]
    list_strategies: bool,

    /// Log per-generation progress
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(generations) = self.generations {
            config.generations = generations;
        }
        if let Some(population) = self.population {
            config.population_size = population;
        }
        if let Some(noise) = self.noise {
            config.noise = noise;
        }
        if let Some(strategies) = &self.strategies {
            config.selected_strategies = strategies.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut run = match &args.config {
        Some(path) => RunFile::load(path)?,
        None => RunFile::default(),
    };
    args.apply_overrides(&mut run.config);
    let registry = run.registry()?;

    let mut out = output(args.output.as_ref())?;

    if args.list_strategies {
        report::write_strategy_list(&mut out, &registry)?;
        out.flush()?;
        return Ok(());
    }

    match run.sweep.as_ref().filter(|_| !args.no_sweep) {
        Some(variations) => {
            let reports = run_sweep(&run.config, variations, &registry)
                .context("sweep could not start")?;
            info!("sweep finished: {} runs", reports.len());
            match args.format {
                OutputFormat::Json => serde_json::to_writer_pretty(&mut out, &reports)?,
                OutputFormat::Summary => {
                    banner(&mut out)?;
                    report::write_sweep_summary(&mut out, &reports)?;
                }
            }
        }
        None => {
            let simulation =
                Simulation::new(run.config.clone(), &registry).context("invalid configuration")?;
            let report = simulation.run();
            match args.format {
                OutputFormat::Json => serde_json::to_writer_pretty(&mut out, &report)?,
                OutputFormat::Summary => {
                    banner(&mut out)?;
                    report::write_summary(&mut out, &report)?;
                }
            }
        }
    }

    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn banner(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", "Prisoner's Evolution".bright_cyan().bold())?;
    writeln!(out, "{}", "====================".cyan())?;
    Ok(())
}

fn output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(stdout())),
    })
}
