//! Population-weighted round-robin tournament
//!
//! Every ordered pair of strategies (self-pairings included) is played
//! once per generation; the pairwise averages are then folded into each
//! strategy's expected payoff against a co-player drawn at random from the
//! rest of the population.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::evolution::Population;
use crate::game::{replicate_average, PairAverage};
use crate::random::SeededRng;
use crate::strategy::Strategy;
use crate::PayoffMatrix;

/// A per-strategy scalar keyed by strategy id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyValue {
    pub id: String,
    pub value: f64,
}

/// Pairwise averages for every ordered pair, row-major in strategy order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairwiseTable {
    ids: Vec<String>,
    cells: Vec<PairAverage>,
}

impl PairwiseTable {
    /// Play every ordered pair (i, j), including i = j, on the shared stream.
    pub fn compute(
        strategies: &[Strategy],
        rounds: u32,
        noise: f64,
        matrix: &PayoffMatrix,
        replications: u32,
        rng: &mut SeededRng,
    ) -> Self {
        let mut cells = Vec::with_capacity(strategies.len() * strategies.len());
        for row in strategies {
            for col in strategies {
                let avg = replicate_average(row, col, rounds, noise, matrix, replications, rng);
                trace!("pairing {} vs {}: pay {:.4} coop {:.4}", row.id, col.id, avg.pay_a, avg.coop_rate_a);
                cells.push(avg);
            }
        }
        Self {
            ids: strategies.iter().map(|s| s.id.clone()).collect(),
            cells,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Full averages for `row` playing against `col`
    pub fn cell(&self, row: usize, col: usize) -> &PairAverage {
        &self.cells[row * self.ids.len() + col]
    }

    /// Average payoff per round `row` earns against `col`
    pub fn payoff(&self, row: usize, col: usize) -> f64 {
        self.cell(row, col).pay_a
    }

    /// Cooperation rate of `row` when playing `col`
    pub fn cooperation(&self, row: usize, col: usize) -> f64 {
        self.cell(row, col).coop_rate_a
    }
}

/// Expected payoff and cooperation rate per strategy for one generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentOutcome {
    pub avg_payoffs: Vec<StrategyValue>,
    pub coop_rates: Vec<StrategyValue>,
}

impl TournamentOutcome {
    /// Fold a pairwise table into population-weighted expectations.
    ///
    /// The focal individual is excluded from its own pool of co-players:
    /// against itself the opponent share is `(n_i - 1) / (N - 1)`, against
    /// any other strategy `n_j / (N - 1)`. With `N <= 1` there is nobody to
    /// play and every expectation stays zero.
    pub fn from_table(table: &PairwiseTable, population: &Population) -> Self {
        let total = population.total();
        let counts: Vec<u64> = table.ids().iter().map(|id| population.count(id)).collect();

        let mut avg_payoffs = Vec::with_capacity(table.len());
        let mut coop_rates = Vec::with_capacity(table.len());

        for (i, id) in table.ids().iter().enumerate() {
            let mut expected_pay = 0.0;
            let mut expected_coop = 0.0;

            if total > 1 {
                let others = (total - 1) as f64;
                for (j, &n_j) in counts.iter().enumerate() {
                    let share = if i == j {
                        n_j.saturating_sub(1) as f64 / others
                    } else {
                        n_j as f64 / others
                    };
                    expected_pay += share * table.payoff(i, j);
                    expected_coop += share * table.cooperation(i, j);
                }
            }

            avg_payoffs.push(StrategyValue { id: id.clone(), value: expected_pay });
            coop_rates.push(StrategyValue { id: id.clone(), value: expected_coop });
        }

        Self { avg_payoffs, coop_rates }
    }

    pub fn payoff(&self, id: &str) -> Option<f64> {
        lookup(&self.avg_payoffs, id)
    }

    pub fn cooperation(&self, id: &str) -> Option<f64> {
        lookup(&self.coop_rates, id)
    }
}

pub(crate) fn lookup(values: &[StrategyValue], id: &str) -> Option<f64> {
    values.iter().find(|v| v.id == id).map(|v| v.value)
}

/// Run one generation's tournament for the current population mix
pub fn aggregate(
    strategies: &[Strategy],
    population: &Population,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    replications: u32,
    rng: &mut SeededRng,
) -> TournamentOutcome {
    let table = PairwiseTable::compute(strategies, rounds, noise, matrix, replications, rng);
    TournamentOutcome::from_table(&table, population)
}
