//! Parameter sweeps over a base configuration

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimulationError};
use crate::registry::StrategyRegistry;
use crate::simulation::{Simulation, SimulationConfig, SimulationReport};
use crate::PayoffMatrix;

/// Upper bound on the number of runs one sweep may expand to
pub const MAX_SWEEP_COMBINATIONS: usize = 1000;

/// Values to try per field. An empty list keeps the base value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepVariations {
    pub noise: Vec<f64>,
    pub rounds: Vec<u32>,
    pub population_size: Vec<u64>,
    pub generations: Vec<u32>,
    pub evolution_rate: Vec<f64>,
    pub replications: Vec<u32>,
    pub selected_strategies: Vec<Vec<String>>,
    pub payoff_matrix: Vec<PayoffMatrix>,
}

impl SweepVariations {
    /// Number of runs the variations expand to
    pub fn combinations(&self) -> usize {
        [
            self.noise.len(),
            self.rounds.len(),
            self.population_size.len(),
            self.generations.len(),
            self.evolution_rate.len(),
            self.replications.len(),
            self.selected_strategies.len(),
            self.payoff_matrix.len(),
        ]
        .iter()
        .fold(1usize, |acc, &n| acc.saturating_mul(n.max(1)))
    }
}

fn vary<T: Clone>(
    configs: Vec<SimulationConfig>,
    values: &[T],
    set: impl Fn(&mut SimulationConfig, T),
) -> Vec<SimulationConfig> {
    if values.is_empty() {
        return configs;
    }
    let mut out = Vec::with_capacity(configs.len() * values.len());
    for cfg in configs {
        for v in values {
            let mut next = cfg.clone();
            set(&mut next, v.clone());
            out.push(next);
        }
    }
    out
}

/// Cartesian product of `variations` over `base`.
///
/// Fields vary in declaration order with `noise` outermost. Expansions
/// larger than [`MAX_SWEEP_COMBINATIONS`] are refused rather than cut short.
pub fn expand_sweep(
    base: &SimulationConfig,
    variations: &SweepVariations,
) -> Result<Vec<SimulationConfig>, ConfigError> {
    let combinations = variations.combinations();
    if combinations > MAX_SWEEP_COMBINATIONS {
        return Err(ConfigError::SweepTooLarge { combinations, limit: MAX_SWEEP_COMBINATIONS });
    }

    let v = variations;
    let mut configs = vec![base.clone()];
    configs = vary(configs, &v.noise, |c, x| c.noise = x);
    configs = vary(configs, &v.rounds, |c, x| c.rounds = x);
    configs = vary(configs, &v.population_size, |c, x| c.population_size = x);
    configs = vary(configs, &v.generations, |c, x| c.generations = x);
    configs = vary(configs, &v.evolution_rate, |c, x| c.evolution_rate = x);
    configs = vary(configs, &v.replications, |c, x| c.replications = x);
    configs = vary(configs, &v.selected_strategies, |c, x| c.selected_strategies = x);
    configs = vary(configs, &v.payoff_matrix, |c, x| c.payoff_matrix = x);
    Ok(configs)
}

/// Expand and run every combination of a sweep in order.
pub fn run_sweep(
    base: &SimulationConfig,
    variations: &SweepVariations,
    registry: &StrategyRegistry,
) -> Result<Vec<SimulationReport>, SimulationError> {
    run_sweep_with_cancel(base, variations, registry, &AtomicBool::new(false))
}

/// Like [`run_sweep`], stopping early once `cancel` is set.
///
/// Every combination is validated before the first run starts. `cancel`
/// is forwarded to each run and also checked between runs; the reports
/// gathered so far are returned, the last one flagged if it was cut short.
pub fn run_sweep_with_cancel(
    base: &SimulationConfig,
    variations: &SweepVariations,
    registry: &StrategyRegistry,
    cancel: &AtomicBool,
) -> Result<Vec<SimulationReport>, SimulationError> {
    let simulations = expand_sweep(base, variations)?
        .into_iter()
        .map(|cfg| Simulation::new(cfg, registry))
        .collect::<Result<Vec<_>, _>>()?;

    info!("sweep: {} runs", simulations.len());
    let mut reports = Vec::with_capacity(simulations.len());
    for (i, sim) in simulations.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            warn!("sweep cancelled before run {} of {}", i + 1, simulations.len());
            break;
        }
        let report = sim.run_with_cancel(cancel);
        let stop = report.cancelled;
        reports.push(report);
        if stop {
            warn!("sweep cancelled during run {} of {}", i + 1, simulations.len());
            break;
        }
    }
    Ok(reports)
}
