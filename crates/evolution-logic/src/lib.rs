//! Evolution Logic for Prisoner's Evolution
//!
//! Core simulation for the evolutionary Iterated Prisoner's Dilemma:
//! seeded randomness, strategies, noisy matches, population-weighted
//! tournaments and replicator-style population updates.
//! This crate is compiled to:
//! - Native (for the command-line runner)
//! - WASM (for the charting frontend)

mod random;
mod strategy;
mod game;
mod tournament;
mod evolution;
mod registry;
mod simulation;
mod sweep;
mod error;
pub mod vm;

#[cfg(feature = "wasm")]
mod wasm;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use random::SeededRng;
pub use strategy::{
    all_strategies, colors, community_strategies, compare_strategies, default_strategies,
    describe_strategy, execute_strategy, HistoryEntry, Move, Strategy, StrategyComparison,
    StrategyKind, GENEROUS_FORGIVENESS, SAMPLE_HISTORIES,
};
pub use game::{checked_replay_match, replay_match, replicate_average, simulate_match, MatchResult, PairAverage, RoundResult};
pub use tournament::{aggregate, PairwiseTable, StrategyValue, TournamentOutcome};
pub use evolution::{evolve, Population, PopulationEntry};
pub use registry::StrategyRegistry;
pub use simulation::{
    validate_noise, GenerationRecord, HeadToHead, LeaderboardEntry, PopulationSnapshot, Progress, Simulation,
    SimulationConfig, SimulationReport, MAX_POPULATION,
};
pub use sweep::{expand_sweep, run_sweep, run_sweep_with_cancel, SweepVariations, MAX_SWEEP_COMBINATIONS};
pub use error::{ConfigError, RegistryError, SimulationError};

/// Payoff matrix for the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoffMatrix {
    /// Temptation: defect against a cooperator
    #[serde(alias = "T")]
    pub t: f64,
    /// Reward: mutual cooperation
    #[serde(alias = "R")]
    pub r: f64,
    /// Punishment: mutual defection
    #[serde(alias = "P")]
    pub p: f64,
    /// Sucker's payoff: cooperate against a defector
    #[serde(alias = "S")]
    pub s: f64,
}

/// Violations of the Prisoner's Dilemma ordering
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PayoffError {
    #[error("payoffs must satisfy T > R > P > S (got T={t}, R={r}, P={p}, S={s})")]
    Ordering { t: f64, r: f64, p: f64, s: f64 },
    #[error("payoffs must satisfy 2R > T + S (got 2R={two_r}, T+S={t_plus_s})")]
    Alternation { two_r: f64, t_plus_s: f64 },
}

impl Default for PayoffMatrix {
    fn default() -> Self {
        Self { t: 5.0, r: 3.0, p: 1.0, s: 0.0 }
    }
}

impl PayoffMatrix {
    pub fn new(t: f64, r: f64, p: f64, s: f64) -> Self {
        Self { t, r, p, s }
    }

    /// Returns (score_a, score_b)
    pub fn payoff(&self, a: Move, b: Move) -> (f64, f64) {
        match (a, b) {
            (Move::Cooperate, Move::Cooperate) => (self.r, self.r),
            (Move::Cooperate, Move::Defect) => (self.s, self.t),
            (Move::Defect, Move::Cooperate) => (self.t, self.s),
            (Move::Defect, Move::Defect) => (self.p, self.p),
        }
    }

    /// Check `T > R > P > S` and `2R > T + S`. Never corrects the matrix.
    pub fn validate(&self) -> Result<(), PayoffError> {
        let Self { t, r, p, s } = *self;
        if !(t > r && r > p && p > s) {
            return Err(PayoffError::Ordering { t, r, p, s });
        }
        if !(2.0 * r > t + s) {
            return Err(PayoffError::Alternation { two_r: 2.0 * r, t_plus_s: t + s });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
