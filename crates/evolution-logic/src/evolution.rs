//! Replicator-style population update

use log::warn;
use serde::{Deserialize, Serialize};

use crate::tournament::{lookup, StrategyValue};

/// Head count of one strategy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationEntry {
    pub id: String,
    pub count: u64,
}

/// Ordered strategy id → count mapping
///
/// Order is the strategy input order and decides tie-breaks in the
/// evolver and leaderboard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Population {
    entries: Vec<PopulationEntry>,
}

impl Population {
    /// Build from (id, count) pairs; repeated ids are merged.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut entries: Vec<PopulationEntry> = Vec::new();
        for (id, count) in counts {
            let id = id.into();
            match entries.iter_mut().find(|e| e.id == id) {
                Some(existing) => existing.count = existing.count.saturating_add(count),
                None => entries.push(PopulationEntry { id, count }),
            }
        }
        Self { entries }
    }

    /// Initial split of `size` individuals across `ids`.
    ///
    /// Each strategy starts with `max(1, size / k)`; any remainder is handed
    /// out one at a time in input order.
    pub fn distribute<S: AsRef<str>>(ids: &[S], size: u64) -> Self {
        if ids.is_empty() {
            return Self::default();
        }
        let k = ids.len() as u64;
        let initial = (size / k).max(1);
        let mut counts: Vec<u64> = vec![initial; ids.len()];
        let remainder = size.saturating_sub(initial * k);
        for i in 0..remainder {
            counts[(i % k) as usize] += 1;
        }
        Self::from_counts(ids.iter().map(|id| id.as_ref().to_string()).zip(counts))
    }

    pub fn entries(&self) -> &[PopulationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PopulationEntry> {
        self.entries.iter()
    }

    /// Count for `id`, zero if absent
    pub fn count(&self, id: &str) -> u64 {
        self.entries.iter().find(|e| e.id == id).map_or(0, |e| e.count)
    }

    /// Total head count N, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.entries.iter().fold(0u64, |acc, e| acc.saturating_add(e.count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Next generation's population
///
/// Each strategy's weight moves by `rate × (payoff − mean) × count`,
/// floored at zero; weights are renormalized to the old total N and
/// rounded independently. Rounding may leave the new total a few units
/// off N and that drift is kept as-is. Only a total of exactly zero is
/// repaired, by placing a single individual on the heaviest strategy
/// (first in order on ties).
pub fn evolve(population: &Population, avg_payoffs: &[StrategyValue], evolution_rate: f64) -> Population {
    let entries = population.entries();
    let n = match population.total() {
        0 => 1.0,
        total => total as f64,
    };
    let payoff = |id: &str| lookup(avg_payoffs, id).unwrap_or(0.0);

    let mean = entries
        .iter()
        .map(|e| payoff(&e.id) * e.count as f64)
        .sum::<f64>()
        / n;

    let weights: Vec<f64> = entries
        .iter()
        .map(|e| {
            let old = e.count as f64;
            (old + evolution_rate * (payoff(&e.id) - mean) * old).max(0.0)
        })
        .collect();
    let weight_total: f64 = weights.iter().sum();

    let mut counts: Vec<u64> = weights
        .iter()
        .map(|w| if weight_total > 0.0 { (w / weight_total * n).round() as u64 } else { 0 })
        .collect();

    if !counts.is_empty() && counts.iter().all(|&c| c == 0) {
        let mut best = 0;
        for (i, w) in weights.iter().enumerate() {
            if *w > weights[best] {
                best = i;
            }
        }
        warn!("population rounded to extinction; seeding one `{}`", entries[best].id);
        counts[best] = 1;
    }

    Population::from_counts(entries.iter().map(|e| e.id.clone()).zip(counts))
}
