//! Match execution engine

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::random::SeededRng;
use crate::simulation::validate_noise;
use crate::strategy::{HistoryEntry, Move, Strategy};
use crate::PayoffMatrix;

/// Result of a single round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    /// Moves the strategies chose, before noise
    pub intended_a: Move,
    pub intended_b: Move,
    /// Moves actually played
    pub move_a: Move,
    pub move_b: Move,
    pub score_a: f64,
    pub score_b: f64,
    pub cumulative_a: f64,
    pub cumulative_b: f64,
}

/// Result of a complete match
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score_a: f64,
    pub score_b: f64,
    pub cooperations_a: u32,
    pub cooperations_b: u32,
    pub rounds: u32,
}

/// Per-round averages of a pairing over all replications
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairAverage {
    pub pay_a: f64,
    pub pay_b: f64,
    pub coop_rate_a: f64,
    pub coop_rate_b: f64,
}

/// Run a complete match between two strategies
///
/// # Arguments
/// * `strategy_a` - First player's strategy
/// * `strategy_b` - Second player's strategy
/// * `rounds` - Number of rounds to play
/// * `noise` - Probability each realized move is flipped
/// * `matrix` - Payoff matrix
/// * `rng` - The run's shared random stream
///
/// # Returns
/// Cumulative scores and cooperation counts
pub fn simulate_match(
    strategy_a: &Strategy,
    strategy_b: &Strategy,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    rng: &mut SeededRng,
) -> MatchResult {
    play(strategy_a, strategy_b, rounds, noise, matrix, rng, None)
}

/// Run a match and keep the round-by-round transcript
///
/// Consumes the random stream exactly like [`simulate_match`].
pub fn replay_match(
    strategy_a: &Strategy,
    strategy_b: &Strategy,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    rng: &mut SeededRng,
) -> (MatchResult, Vec<RoundResult>) {
    let mut transcript = Vec::with_capacity(preallocate(rounds));
    let result = play(strategy_a, strategy_b, rounds, noise, matrix, rng, Some(&mut transcript));
    (result, transcript)
}

/// [`replay_match`] for untrusted inputs: noise and matrix are checked first.
pub fn checked_replay_match(
    strategy_a: &Strategy,
    strategy_b: &Strategy,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    rng: &mut SeededRng,
) -> Result<(MatchResult, Vec<RoundResult>), ConfigError> {
    validate_noise(noise)?;
    matrix.validate()?;
    Ok(replay_match(strategy_a, strategy_b, rounds, noise, matrix, rng))
}

/// Up-front reservation for per-round buffers; larger matches grow on demand.
const MAX_PREALLOCATED_ROUNDS: usize = 1024;

fn preallocate(rounds: u32) -> usize {
    (rounds as usize).min(MAX_PREALLOCATED_ROUNDS)
}

fn play(
    strategy_a: &Strategy,
    strategy_b: &Strategy,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    rng: &mut SeededRng,
    mut transcript: Option<&mut Vec<RoundResult>>,
) -> MatchResult {
    let mut history_a: Vec<HistoryEntry> = Vec::with_capacity(preallocate(rounds));
    let mut history_b: Vec<HistoryEntry> = Vec::with_capacity(preallocate(rounds));
    let mut result = MatchResult {
        score_a: 0.0,
        score_b: 0.0,
        cooperations_a: 0,
        cooperations_b: 0,
        rounds,
    };

    for round in 0..rounds {
        let intended_a = strategy_a.decide(&history_a, rng);
        let intended_b = strategy_b.decide(&history_b, rng);

        // Noise: A's flip is always drawn before B's
        let move_a = if rng.chance(noise) { intended_a.flipped() } else { intended_a };
        let move_b = if rng.chance(noise) { intended_b.flipped() } else { intended_b };

        if move_a.is_cooperate() {
            result.cooperations_a += 1;
        }
        if move_b.is_cooperate() {
            result.cooperations_b += 1;
        }

        let (score_a, score_b) = matrix.payoff(move_a, move_b);
        result.score_a += score_a;
        result.score_b += score_b;

        if let Some(t) = transcript.as_deref_mut() {
            t.push(RoundResult {
                round,
                intended_a,
                intended_b,
                move_a,
                move_b,
                score_a,
                score_b,
                cumulative_a: result.score_a,
                cumulative_b: result.score_b,
            });
        }

        history_a.push(HistoryEntry::new(move_a, move_b));
        history_b.push(HistoryEntry::new(move_b, move_a));
    }

    result
}

/// Play a pairing `replications` times and reduce to per-round averages
///
/// All replications continue the same random stream. Zero total rounds
/// yields all-zero averages.
pub fn replicate_average(
    strategy_a: &Strategy,
    strategy_b: &Strategy,
    rounds: u32,
    noise: f64,
    matrix: &PayoffMatrix,
    replications: u32,
    rng: &mut SeededRng,
) -> PairAverage {
    let mut score_a = 0.0;
    let mut score_b = 0.0;
    let mut coop_a = 0u64;
    let mut coop_b = 0u64;
    let mut total_rounds = 0u64;

    for _ in 0..replications {
        let m = simulate_match(strategy_a, strategy_b, rounds, noise, matrix, rng);
        score_a += m.score_a;
        score_b += m.score_b;
        coop_a += u64::from(m.cooperations_a);
        coop_b += u64::from(m.cooperations_b);
        total_rounds += u64::from(m.rounds);
    }

    if total_rounds == 0 {
        return PairAverage::default();
    }

    let n = total_rounds as f64;
    PairAverage {
        pay_a: score_a / n,
        pay_b: score_b / n,
        coop_rate_a: coop_a as f64 / n,
        coop_rate_b: coop_b as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{all_strategies, StrategyKind};

    fn strategy(id: &str) -> Strategy {
        all_strategies().into_iter().find(|s| s.id == id).unwrap()
    }

    fn matrix() -> PayoffMatrix {
        PayoffMatrix::default()
    }

    #[test]
    fn test_preallocation_is_clamped() {
        assert_eq!(preallocate(10), 10);
        assert_eq!(preallocate(u32::MAX), MAX_PREALLOCATED_ROUNDS);
    }

    #[test]
    fn test_checked_replay_rejects_bad_inputs() {
        let tft = strategy("titForTat");
        let mut rng = SeededRng::new(1);
        assert!(matches!(
            checked_replay_match(&tft, &tft, 5, 1.5, &matrix(), &mut rng),
            Err(ConfigError::OutOfRange { field: "noise", .. })
        ));
        assert!(matches!(
            checked_replay_match(&tft, &tft, 5, f64::NAN, &matrix(), &mut rng),
            Err(ConfigError::OutOfRange { field: "noise", .. })
        ));
        let broken = PayoffMatrix::new(1.0, 3.0, 2.0, 0.0);
        assert!(matches!(
            checked_replay_match(&tft, &tft, 5, 0.0, &broken, &mut rng),
            Err(ConfigError::Payoff(_))
        ));
        assert_eq!(rng, SeededRng::new(1));

        let (result, rounds) = checked_replay_match(&tft, &tft, 5, 0.0, &matrix(), &mut rng).unwrap();
        assert_eq!(rounds.len(), 5);
        assert_eq!(result.score_a, 15.0);
    }

    #[test]
    fn test_cooperate_vs_cooperate() {
        let ac = strategy("alwaysCooperate");
        let result = simulate_match(&ac, &ac, 50, 0.0, &matrix(), &mut SeededRng::new(1));
        assert_eq!(result.score_a, 150.0);
        assert_eq!(result.score_b, 150.0);
        assert_eq!(result.cooperations_a, 50);
        assert_eq!(result.rounds, 50);
    }

    #[test]
    fn test_defect_vs_cooperate() {
        let ad = strategy("alwaysDefect");
        let ac = strategy("alwaysCooperate");
        let result = simulate_match(&ad, &ac, 20, 0.0, &matrix(), &mut SeededRng::new(1));
        assert_eq!(result.score_a, 100.0);
        assert_eq!(result.score_b, 0.0);
        assert_eq!(result.cooperations_a, 0);
        assert_eq!(result.cooperations_b, 20);
    }

    #[test]
    fn test_tft_vs_always_defect() {
        let tft = strategy("titForTat");
        let ad = strategy("alwaysDefect");
        let (result, rounds) = replay_match(&tft, &ad, 10, 0.0, &matrix(), &mut SeededRng::new(1));

        assert_eq!(rounds[0].move_a, Move::Cooperate);
        assert_eq!(rounds[0].move_b, Move::Defect);
        for r in rounds.iter().skip(1) {
            assert_eq!(r.move_a, Move::Defect);
            assert_eq!(r.move_b, Move::Defect);
        }
        // S once, then P nine times
        assert_eq!(result.score_a, 9.0);
        assert_eq!(result.score_b, 5.0 + 9.0);
    }

    #[test]
    fn test_match_consumes_two_noise_draws_per_round() {
        let ac = strategy("alwaysCooperate");
        let mut rng = SeededRng::new(5);
        simulate_match(&ac, &ac, 7, 0.0, &matrix(), &mut rng);
        let mut expected = SeededRng::new(5);
        for _ in 0..14 {
            expected.next_u32();
        }
        assert_eq!(rng, expected);
    }

    #[test]
    fn test_noise_flips_realized_move() {
        let ac = strategy("alwaysCooperate");
        let ad = strategy("alwaysDefect");
        let (result, rounds) = replay_match(&ac, &ad, 200, 1.0, &matrix(), &mut SeededRng::new(3));
        // certain noise inverts both sides every round
        assert!(rounds.iter().all(|r| r.intended_a == Move::Cooperate && r.move_a == Move::Defect));
        assert!(rounds.iter().all(|r| r.intended_b == Move::Defect && r.move_b == Move::Cooperate));
        assert_eq!(result.score_a, 1000.0);
        assert_eq!(result.cooperations_b, 200);
    }

    #[test]
    fn test_history_records_actual_moves() {
        // TFT reacts to the noisy realized move of its opponent
        let tft = strategy("titForTat");
        let ac = strategy("alwaysCooperate");
        let (_, rounds) = replay_match(&tft, &ac, 300, 0.2, &matrix(), &mut SeededRng::new(11));
        for pair in rounds.windows(2) {
            assert_eq!(pair[1].intended_a, pair[0].move_b);
        }
    }

    #[test]
    fn test_replay_matches_simulate() {
        let gtft = strategy("generousTFT");
        let rnd = strategy("random");
        let mut r1 = SeededRng::new(77);
        let mut r2 = SeededRng::new(77);
        let plain = simulate_match(&gtft, &rnd, 100, 0.05, &matrix(), &mut r1);
        let (replayed, transcript) = replay_match(&gtft, &rnd, 100, 0.05, &matrix(), &mut r2);
        assert_eq!(plain, replayed);
        assert_eq!(r1, r2);
        assert_eq!(transcript.len(), 100);
        assert_eq!(transcript.last().unwrap().cumulative_a, plain.score_a);
    }

    #[test]
    fn test_match_determinism() {
        let tft = strategy("titForTat");
        let rnd = strategy("random");
        let a = replay_match(&tft, &rnd, 60, 0.1, &matrix(), &mut SeededRng::new(42));
        let b = replay_match(&tft, &rnd, 60, 0.1, &matrix(), &mut SeededRng::new(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_tft_mirror_noise_sanity() {
        let tft = strategy("titForTat");
        let clean = replicate_average(&tft, &tft, 500, 0.0, &matrix(), 1, &mut SeededRng::new(8));
        assert_eq!(clean.coop_rate_a, 1.0);
        assert_eq!(clean.pay_a, 3.0);

        let noisy = replicate_average(&tft, &tft, 500, 0.05, &matrix(), 1, &mut SeededRng::new(8));
        assert!(noisy.coop_rate_a < 1.0);
    }

    #[test]
    fn test_known_pair_averages() {
        let m = matrix();
        let ac = strategy("alwaysCooperate");
        let ad = strategy("alwaysDefect");
        let mut rng = SeededRng::new(2);

        let cc = replicate_average(&ac, &ac, 13, 0.0, &m, 3, &mut rng);
        assert_eq!((cc.pay_a, cc.pay_b), (m.r, m.r));
        let dd = replicate_average(&ad, &ad, 13, 0.0, &m, 3, &mut rng);
        assert_eq!((dd.pay_a, dd.pay_b), (m.p, m.p));
        assert_eq!(dd.coop_rate_a, 0.0);
        let cd = replicate_average(&ac, &ad, 13, 0.0, &m, 3, &mut rng);
        assert_eq!((cd.pay_a, cd.pay_b), (m.s, m.t));
        assert_eq!((cd.coop_rate_a, cd.coop_rate_b), (1.0, 0.0));
    }

    #[test]
    fn test_zero_rounds_or_replications() {
        let ac = strategy("alwaysCooperate");
        let mut rng = SeededRng::new(2);
        assert_eq!(replicate_average(&ac, &ac, 0, 0.1, &matrix(), 5, &mut rng), PairAverage::default());
        assert_eq!(replicate_average(&ac, &ac, 10, 0.1, &matrix(), 0, &mut rng), PairAverage::default());
    }

    #[test]
    fn test_rates_within_bounds() {
        let m = matrix();
        let all = all_strategies();
        let mut rng = SeededRng::new(99);
        for a in &all {
            for b in &all {
                let avg = replicate_average(a, b, 30, 0.05, &m, 2, &mut rng);
                for rate in [avg.coop_rate_a, avg.coop_rate_b] {
                    assert!((0.0..=1.0).contains(&rate));
                }
                for pay in [avg.pay_a, avg.pay_b] {
                    assert!(pay >= m.s && pay <= m.t);
                }
            }
        }
    }

    #[test]
    fn test_replication_variance_shrinks() {
        let rnd = strategy("random");
        let m = matrix();
        let variance = |replications: u32| {
            let samples: Vec<f64> = (0..40)
                .map(|seed| replicate_average(&rnd, &rnd, 20, 0.0, &m, replications, &mut SeededRng::new(seed)).pay_a)
                .collect();
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64
        };
        assert!(variance(16) < variance(1));
    }

    #[test]
    fn test_custom_kind_in_match() {
        use crate::vm::op;
        let mirror = Strategy::custom("mirror", "Mirror", "tester", vec![op::OPP_LAST, op::RETURN]);
        let ad = strategy("alwaysDefect");
        let (_, rounds) = replay_match(&mirror, &ad, 5, 0.0, &matrix(), &mut SeededRng::new(1));
        assert_eq!(rounds[0].move_a, Move::Cooperate);
        assert!(rounds[1..].iter().all(|r| r.move_a == Move::Defect));
        assert!(matches!(mirror.kind, StrategyKind::Custom { .. }));
    }
}
