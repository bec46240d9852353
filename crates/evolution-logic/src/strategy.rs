//! Strategy definitions and execution

use serde::{Deserialize, Serialize};

use crate::random::SeededRng;
use crate::vm::execute_bytecode;

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Cooperate,
    Defect,
}

impl Move {
    /// The opposite move (used for noise flips and Pavlov shifts)
    pub fn flipped(self) -> Self {
        match self {
            Move::Cooperate => Move::Defect,
            Move::Defect => Move::Cooperate,
        }
    }

    pub fn is_cooperate(self) -> bool {
        self == Move::Cooperate
    }
}

/// One completed round, seen from one player's side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub own: Move,
    pub opponent: Move,
}

impl HistoryEntry {
    pub const fn new(own: Move, opponent: Move) -> Self {
        Self { own, opponent }
    }
}

const CC: HistoryEntry = HistoryEntry::new(Move::Cooperate, Move::Cooperate);
const CD: HistoryEntry = HistoryEntry::new(Move::Cooperate, Move::Defect);
const DC: HistoryEntry = HistoryEntry::new(Move::Defect, Move::Cooperate);
const DD: HistoryEntry = HistoryEntry::new(Move::Defect, Move::Defect);

/// Fixed histories used to exercise strategies at admission and comparison.
pub const SAMPLE_HISTORIES: [&[HistoryEntry]; 6] = [
    &[],
    &[CC],
    &[DC],
    &[CD],
    &[DD],
    &[CC, CD, DD, DC, CC, CD],
];

/// Probability that Generous TFT forgives an opponent's defection.
pub const GENEROUS_FORGIVENESS: f64 = 0.10;

/// Colorblind-safe palette (Okabe–Ito plus extras for community entries)
pub mod colors {
    pub const ORANGE: &str = "#E69F00";
    pub const SKY: &str = "#56B4E9";
    pub const GREEN: &str = "#009E73";
    pub const YELLOW: &str = "#F0E442";
    pub const BLUE: &str = "#0072B2";
    pub const VERMIL: &str = "#D55E00";
    pub const PURPLE: &str = "#CC79A7";
    pub const RED: &str = "#FF6B6B";
    pub const TEAL: &str = "#4ECDC4";
    pub const CYAN: &str = "#45B7D1";
    pub const PINK: &str = "#FF69B4";
    pub const LIME: &str = "#32CD32";
}

/// Decision policy of a strategy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Always cooperate, never defect.
    AlwaysCooperate,
    /// Always defect, never cooperate.
    AlwaysDefect,
    /// Copy opponent's last move. Start with cooperate.
    TitForTat,
    /// Tit-for-Tat that forgives a defection 10% of the time.
    GenerousTitForTat,
    /// Cooperate until opponent defects once, then always defect.
    GrimTrigger,
    /// Win-stay, lose-shift on mutual outcomes.
    Pavlov,
    /// Fair coin each round.
    Random,
    /// Cooperate for three rounds, then defect.
    Opportunist,
    /// Follow the opponent's recent cooperation rate.
    Adaptive,
    /// Fixed probing schedule of defections.
    Gradual,
    /// User-submitted VM program.
    Custom { program: Vec<u8> },
}

/// Complete strategy: identity, metadata and decision policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u32>,
    pub kind: StrategyKind,
}

impl Strategy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: &str, kind: StrategyKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.to_string(),
            author: None,
            rating: None,
            downloads: None,
            kind,
        }
    }

    /// User-defined strategy backed by a VM program.
    ///
    /// The color is derived from the id so repeated runs render the same.
    /// Admission checks happen in the registry, not here.
    pub fn custom(id: impl Into<String>, name: impl Into<String>, author: impl Into<String>, program: Vec<u8>) -> Self {
        let id = id.into();
        let color = color_for(&id);
        Self {
            color,
            author: Some(author.into()),
            rating: Some(0.0),
            downloads: Some(0),
            ..Self::new(id, name, "", StrategyKind::Custom { program })
        }
    }

    fn community(mut self, rating: f64, downloads: u32) -> Self {
        self.author = Some("Community".to_string());
        self.rating = Some(rating);
        self.downloads = Some(downloads);
        self
    }

    /// Choose the next move from this match's history
    pub fn decide(&self, history: &[HistoryEntry], rng: &mut SeededRng) -> Move {
        execute_strategy(&self.kind, history, rng)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, StrategyKind::Custom { .. })
    }
}

/// Execute a strategy for one round
///
/// # Arguments
/// * `kind` - The decision policy
/// * `history` - This player's view of the match so far
/// * `rng` - The run's shared random stream
pub fn execute_strategy(kind: &StrategyKind, history: &[HistoryEntry], rng: &mut SeededRng) -> Move {
    match kind {
        StrategyKind::AlwaysCooperate => Move::Cooperate,
        StrategyKind::AlwaysDefect => Move::Defect,
        StrategyKind::TitForTat => execute_tit_for_tat(history),
        StrategyKind::GenerousTitForTat => execute_generous_tit_for_tat(history, rng),
        StrategyKind::GrimTrigger => execute_grim_trigger(history),
        StrategyKind::Pavlov => execute_pavlov(history),
        StrategyKind::Random => execute_random(rng),
        StrategyKind::Opportunist => execute_opportunist(history),
        StrategyKind::Adaptive => execute_adaptive(history),
        StrategyKind::Gradual => execute_gradual(history),
        StrategyKind::Custom { program } => execute_bytecode(program, history, rng),
    }
}

/// Tit-for-Tat: Copy opponent's last move, start with cooperate
fn execute_tit_for_tat(history: &[HistoryEntry]) -> Move {
    history.last().map_or(Move::Cooperate, |e| e.opponent)
}

/// Generous Tit-for-Tat: forgive a defection with fixed probability.
/// The RNG is only consulted after an opponent defection.
fn execute_generous_tit_for_tat(history: &[HistoryEntry], rng: &mut SeededRng) -> Move {
    match history.last() {
        None => Move::Cooperate,
        Some(e) if e.opponent == Move::Defect && rng.chance(GENEROUS_FORGIVENESS) => Move::Cooperate,
        Some(e) => e.opponent,
    }
}

/// Grim Trigger: Cooperate until opponent defects, then always defect
fn execute_grim_trigger(history: &[HistoryEntry]) -> Move {
    if history.iter().any(|e| e.opponent == Move::Defect) {
        Move::Defect
    } else {
        Move::Cooperate
    }
}

/// Pavlov: stay after mutual cooperation or mutual defection, shift otherwise
fn execute_pavlov(history: &[HistoryEntry]) -> Move {
    match history.last() {
        None => Move::Cooperate,
        Some(e) if e.own == e.opponent => e.own,
        Some(e) => e.own.flipped(),
    }
}

fn execute_random(rng: &mut SeededRng) -> Move {
    if rng.chance(0.5) {
        Move::Cooperate
    } else {
        Move::Defect
    }
}

fn execute_opportunist(history: &[HistoryEntry]) -> Move {
    if history.len() < 3 {
        Move::Cooperate
    } else {
        Move::Defect
    }
}

/// Adaptive: cooperate while the opponent cooperated in more than 60% of
/// the last five rounds
fn execute_adaptive(history: &[HistoryEntry]) -> Move {
    if history.is_empty() {
        return Move::Cooperate;
    }
    let recent = &history[history.len().saturating_sub(5)..];
    let cooperated = recent.iter().filter(|e| e.opponent.is_cooperate()).count();
    if cooperated as f64 / recent.len() as f64 > 0.6 {
        Move::Cooperate
    } else {
        Move::Defect
    }
}

/// Gradual: probe with defections at fixed rounds, cooperate otherwise
fn execute_gradual(history: &[HistoryEntry]) -> Move {
    match history.len() {
        2 | 6 | 7 | 9 | 10 => Move::Defect,
        _ => Move::Cooperate,
    }
}

/// Get a human-readable description of a strategy
pub fn describe_strategy(strategy: &Strategy) -> String {
    let desc = match &strategy.kind {
        StrategyKind::AlwaysCooperate => "Never defects. Always cooperates.",
        StrategyKind::AlwaysDefect => "Never cooperates. Always defects.",
        StrategyKind::TitForTat => "Copies opponent's last move. Starts by cooperating.",
        StrategyKind::GenerousTitForTat => "Copies opponent's last move, but forgives 10% of defections.",
        StrategyKind::GrimTrigger => "Cooperates until betrayed, then always defects.",
        StrategyKind::Pavlov => "Repeats its move after mutual outcomes, switches otherwise.",
        StrategyKind::Random => "Randomly cooperates or defects each round.",
        StrategyKind::Opportunist => "Cooperates for three rounds, then defects.",
        StrategyKind::Adaptive => "Cooperates while the opponent recently cooperated.",
        StrategyKind::Gradual => "Probes with occasional defections early on.",
        StrategyKind::Custom { .. } => "User-defined program.",
    };
    match &strategy.author {
        Some(author) => format!("{desc} By {author}."),
        None => desc.to_string(),
    }
}

// ── Catalog ──────────────────────────────────────────────────────────

/// Built-in strategies
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy::new("alwaysCooperate", "Always Cooperate", colors::SKY, StrategyKind::AlwaysCooperate),
        Strategy::new("alwaysDefect", "Always Defect", colors::VERMIL, StrategyKind::AlwaysDefect),
        Strategy::new("titForTat", "Tit for Tat", colors::BLUE, StrategyKind::TitForTat),
        Strategy::new(
            "generousTFT",
            "Generous TFT (10% forgiveness)",
            colors::GREEN,
            StrategyKind::GenerousTitForTat,
        ),
        Strategy::new("grimTrigger", "Grim Trigger", colors::ORANGE, StrategyKind::GrimTrigger),
        Strategy::new("pavlov", "Pavlov (Win-Stay-Lose-Shift)", colors::PURPLE, StrategyKind::Pavlov),
        Strategy::new("random", "Random", colors::YELLOW, StrategyKind::Random),
    ]
}

/// Community strategies
pub fn community_strategies() -> Vec<Strategy> {
    vec![
        Strategy::new("copycat", "Copycat", colors::RED, StrategyKind::TitForTat).community(4.2, 156),
        Strategy::new("forgiving", "Forgiving", colors::TEAL, StrategyKind::GrimTrigger).community(4.2, 89),
        Strategy::new("opportunist", "Opportunist", colors::CYAN, StrategyKind::Opportunist).community(3.5, 67),
        Strategy::new("adaptive", "Adaptive", colors::PINK, StrategyKind::Adaptive).community(4.0, 123),
        Strategy::new("gradual", "Gradual", colors::LIME, StrategyKind::Gradual).community(3.8, 45),
    ]
}

/// All catalog strategies, built-ins first
pub fn all_strategies() -> Vec<Strategy> {
    let mut all = default_strategies();
    all.extend(community_strategies());
    all
}

fn color_for(id: &str) -> String {
    // FNV-1a, folded to 24 bits
    let mut hash: u32 = 0x811c_9dc5;
    for b in id.bytes() {
        hash = (hash ^ u32::from(b)).wrapping_mul(0x0100_0193);
    }
    format!("#{:06X}", hash & 0x00FF_FFFF)
}

// ── Comparison ───────────────────────────────────────────────────────

const COMPARISON_SEED: u32 = 0x00c0_ffee;

/// Behavioural and metadata comparison of two strategies
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    /// Fraction of sample histories on which both choose the same move
    pub similarity: f64,
    /// Metadata fields that differ
    pub differences: Vec<String>,
}

/// Compare two strategies on the sample histories.
///
/// Each side gets an identically seeded private stream per history, so
/// random policies are compared on equal draws.
pub fn compare_strategies(a: &Strategy, b: &Strategy) -> StrategyComparison {
    let mut differences = Vec::new();
    if a.name != b.name {
        differences.push("name".to_string());
    }
    if a.color != b.color {
        differences.push("color".to_string());
    }
    if a.author != b.author {
        differences.push("author".to_string());
    }

    let matching = SAMPLE_HISTORIES
        .iter()
        .filter(|history| {
            let move_a = a.decide(history, &mut SeededRng::new(COMPARISON_SEED));
            let move_b = b.decide(history, &mut SeededRng::new(COMPARISON_SEED));
            move_a == move_b
        })
        .count();

    StrategyComparison {
        similarity: matching as f64 / SAMPLE_HISTORIES.len() as f64,
        differences,
    }
}
