//! Run orchestration
//!
//! A [`Simulation`] owns a validated configuration and the resolved strategy
//! set. Running it threads one seeded stream through every generation's
//! tournament, records the series, evolves the population and finishes with
//! a head-to-head table and a leaderboard.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimulationError};
use crate::evolution::{evolve, Population};
use crate::random::SeededRng;
use crate::registry::StrategyRegistry;
use crate::strategy::Strategy;
use crate::tournament::{PairwiseTable, StrategyValue, TournamentOutcome};
use crate::PayoffMatrix;

/// Everything a run needs besides the strategy definitions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub payoff_matrix: PayoffMatrix,
    /// Probability that each realized move is flipped
    pub noise: f64,
    pub rounds: u32,
    pub population_size: u64,
    pub generations: u32,
    pub evolution_rate: f64,
    pub replications: u32,
    pub seed: u32,
    /// Strategy ids in input order; order decides every tie-break
    pub selected_strategies: Vec<String>,
}

/// Largest population whose head counts are exact as `f64` (2^53)
pub const MAX_POPULATION: u64 = 1 << 53;

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            payoff_matrix: PayoffMatrix::default(),
            noise: 0.01,
            rounds: 100,
            population_size: 1000,
            generations: 100,
            evolution_rate: 0.1,
            replications: 10,
            seed: 123_456_789,
            selected_strategies: vec![
                "titForTat".to_string(),
                "alwaysCooperate".to_string(),
                "alwaysDefect".to_string(),
            ],
        }
    }
}

impl SimulationConfig {
    /// Check the configuration without touching any registry.
    ///
    /// Zero rounds, replications or generations are accepted; they simply
    /// produce zero averages or empty series.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.payoff_matrix.validate()?;
        if self.selected_strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        validate_noise(self.noise)?;
        if !self.evolution_rate.is_finite() || self.evolution_rate < 0.0 {
            return Err(ConfigError::BelowMinimum {
                field: "evolution_rate",
                min: 0.0,
                value: self.evolution_rate,
            });
        }
        if self.population_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "population_size",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.population_size > MAX_POPULATION {
            return Err(ConfigError::OutOfRange {
                field: "population_size",
                min: 1.0,
                max: MAX_POPULATION as f64,
                value: self.population_size as f64,
            });
        }
        Ok(())
    }
}

/// Noise is a flip probability and must lie in [0, 1].
pub fn validate_noise(noise: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&noise) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field: "noise", min: 0.0, max: 1.0, value: noise })
    }
}

/// One generation's per-strategy values (payoff or cooperation rate)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub values: Vec<StrategyValue>,
}

impl GenerationRecord {
    pub fn get(&self, id: &str) -> Option<f64> {
        crate::tournament::lookup(&self.values, id)
    }
}

/// Population as it stood when a generation's tournament was played
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: u32,
    pub population: Population,
}

/// Average payoff per round the row strategy earns against the column strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub ids: Vec<String>,
    pub payoffs: Vec<Vec<f64>>,
}

impl HeadToHead {
    fn from_table(table: &PairwiseTable) -> Self {
        let n = table.len();
        Self {
            ids: table.ids().to_vec(),
            payoffs: (0..n)
                .map(|row| (0..n).map(|col| table.payoff(row, col)).collect())
                .collect(),
        }
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.ids.iter().position(|id| id == row)?;
        let c = self.ids.iter().position(|id| id == col)?;
        Some(self.payoffs[r][c])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub count: u64,
}

/// Completed generations so far, out of the configured total
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub generation: u32,
    pub total: u32,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            f64::from(self.generation) / f64::from(self.total)
        }
    }
}

/// Everything a run produces
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub config: SimulationConfig,
    pub payoff_series: Vec<GenerationRecord>,
    pub cooperation_series: Vec<GenerationRecord>,
    pub population_series: Vec<PopulationSnapshot>,
    pub head_to_head: HeadToHead,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub final_population: Population,
    /// Set when the run stopped early on request
    pub cancelled: bool,
}

impl SimulationReport {
    pub fn generations_completed(&self) -> usize {
        self.payoff_series.len()
    }

    /// Leaderboard head, if any strategy was selected
    pub fn winner(&self) -> Option<&LeaderboardEntry> {
        self.leaderboard.first()
    }
}

/// A validated, ready-to-run simulation
#[derive(Clone, Debug)]
pub struct Simulation {
    config: SimulationConfig,
    strategies: Vec<Strategy>,
}

impl Simulation {
    /// Validate `config` and resolve its strategy selection against `registry`.
    pub fn new(config: SimulationConfig, registry: &StrategyRegistry) -> Result<Self, SimulationError> {
        config.validate()?;
        let strategies = registry.resolve(&config.selected_strategies)?;
        Ok(Self { config, strategies })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn run(&self) -> SimulationReport {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    pub fn run_with_cancel(&self, cancel: &AtomicBool) -> SimulationReport {
        self.run_observed(cancel, |_| {})
    }

    /// Run to completion or until `cancel` is raised.
    ///
    /// The flag is only read between generations, so every recorded
    /// generation is complete. `on_progress` fires after each generation.
    pub fn run_observed<F>(&self, cancel: &AtomicBool, mut on_progress: F) -> SimulationReport
    where
        F: FnMut(Progress),
    {
        let cfg = &self.config;
        let ids: Vec<&str> = self.strategies.iter().map(|s| s.id.as_str()).collect();
        info!(
            "starting run: {} strategies, {} generations, population {}, seed {}",
            ids.len(),
            cfg.generations,
            cfg.population_size,
            cfg.seed
        );

        let mut rng = SeededRng::new(cfg.seed);
        let mut population = Population::distribute(&ids, cfg.population_size);

        let mut payoff_series = Vec::new();
        let mut cooperation_series = Vec::new();
        let mut population_series = Vec::new();
        let mut cancelled = false;

        for generation in 0..cfg.generations {
            let table = PairwiseTable::compute(
                &self.strategies,
                cfg.rounds,
                cfg.noise,
                &cfg.payoff_matrix,
                cfg.replications,
                &mut rng,
            );
            let outcome = TournamentOutcome::from_table(&table, &population);

            let next = evolve(&population, &outcome.avg_payoffs, cfg.evolution_rate);
            debug!(
                "generation {}: population {} -> {}",
                generation,
                population.total(),
                next.total()
            );

            payoff_series.push(GenerationRecord { generation, values: outcome.avg_payoffs });
            cooperation_series.push(GenerationRecord { generation, values: outcome.coop_rates });
            population_series.push(PopulationSnapshot { generation, population });
            population = next;

            on_progress(Progress { generation: generation + 1, total: cfg.generations });

            if generation + 1 < cfg.generations && cancel.load(Ordering::Relaxed) {
                warn!("run cancelled after {} of {} generations", generation + 1, cfg.generations);
                cancelled = true;
                break;
            }
        }

        let table = PairwiseTable::compute(
            &self.strategies,
            cfg.rounds,
            cfg.noise,
            &cfg.payoff_matrix,
            cfg.replications,
            &mut rng,
        );
        let head_to_head = HeadToHead::from_table(&table);

        let mut leaderboard: Vec<LeaderboardEntry> = self
            .strategies
            .iter()
            .map(|s| LeaderboardEntry {
                id: s.id.clone(),
                name: s.name.clone(),
                count: population.count(&s.id),
            })
            .collect();
        leaderboard.sort_by(|a, b| b.count.cmp(&a.count));

        if let Some(top) = leaderboard.first() {
            info!("run finished: `{}` leads with {} of {}", top.id, top.count, population.total());
        }

        SimulationReport {
            config: cfg.clone(),
            payoff_series,
            cooperation_series,
            population_series,
            head_to_head,
            leaderboard,
            final_population: population,
            cancelled,
        }
    }
}
