//! WASM bindings for the charting frontend

#![cfg(feature = "wasm")]

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::strategy::describe_strategy;
use crate::vm::{admit_program, assemble};
use crate::{
    checked_replay_match, PayoffMatrix, SeededRng, Simulation, SimulationConfig, Strategy,
    StrategyRegistry,
};

/// Custom strategy as submitted by the editor
#[derive(Deserialize)]
struct CustomStrategyInput {
    id: String,
    name: String,
    #[serde(default)]
    author: String,
    /// Assembly listing, e.g. `"OPP_LAST RETURN"`
    source: String,
}

/// Simulation request: a config plus any custom strategies it selects
#[derive(Deserialize)]
struct RunRequest {
    #[serde(default)]
    config: SimulationConfig,
    #[serde(default)]
    custom: Vec<CustomStrategyInput>,
}

fn build_registry(custom: Vec<CustomStrategyInput>) -> Result<StrategyRegistry, JsError> {
    let mut registry = StrategyRegistry::new();
    for input in custom {
        let program = assemble(&input.source)
            .map_err(|e| JsError::new(&format!("Strategy `{}`: {}", input.id, e)))?;
        registry
            .register(Strategy::custom(input.id, input.name, input.author, program))
            .map_err(|e| JsError::new(&e.to_string()))?;
    }
    Ok(registry)
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Run a full simulation
///
/// # Arguments
/// * `request_json` - `{"config": SimulationConfig, "custom": [...]}`
///
/// # Returns
/// The serialized SimulationReport
#[wasm_bindgen]
pub fn run_simulation(request_json: &str) -> Result<JsValue, JsError> {
    let request: RunRequest = serde_json::from_str(request_json)
        .map_err(|e| JsError::new(&format!("Invalid request: {}", e)))?;
    let registry = build_registry(request.custom)?;
    let simulation = Simulation::new(request.config, &registry)
        .map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&simulation.run())
}

/// Run a full simulation, calling `on_progress(generation, total)` after
/// each generation so the page can drive a progress bar.
///
/// Returning `false` from the callback cancels the run at that boundary.
#[wasm_bindgen]
pub fn run_simulation_with_progress(
    request_json: &str,
    on_progress: &js_sys::Function,
) -> Result<JsValue, JsError> {
    let request: RunRequest = serde_json::from_str(request_json)
        .map_err(|e| JsError::new(&format!("Invalid request: {}", e)))?;
    let registry = build_registry(request.custom)?;
    let simulation = Simulation::new(request.config, &registry)
        .map_err(|e| JsError::new(&e.to_string()))?;

    let cancel = AtomicBool::new(false);
    let report = simulation.run_observed(&cancel, |p| {
        let keep_going = on_progress
            .call2(
                &JsValue::NULL,
                &JsValue::from(p.generation),
                &JsValue::from(p.total),
            )
            .map(|v| v.as_bool() != Some(false))
            .unwrap_or(false);
        if !keep_going {
            cancel.store(true, Ordering::Relaxed);
        }
    });
    to_js(&report)
}

/// Default configuration, for seeding the settings form
#[wasm_bindgen]
pub fn get_default_config() -> Result<JsValue, JsError> {
    to_js(&SimulationConfig::default())
}

#[derive(Serialize)]
struct StrategyInfo {
    id: String,
    name: String,
    color: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    downloads: Option<u32>,
}

/// All catalog strategies with display metadata
#[wasm_bindgen]
pub fn get_strategies() -> Result<JsValue, JsError> {
    let infos: Vec<StrategyInfo> = StrategyRegistry::new()
        .strategies()
        .iter()
        .map(|s| StrategyInfo {
            id: s.id.clone(),
            name: s.name.clone(),
            color: s.color.clone(),
            description: describe_strategy(s),
            author: s.author.clone(),
            rating: s.rating,
            downloads: s.downloads,
        })
        .collect();
    to_js(&infos)
}

/// Validate a payoff matrix JSON (`{"T":5,"R":3,"P":1,"S":0}`)
///
/// Returns an empty string when valid, otherwise the reason.
#[wasm_bindgen]
pub fn validate_payoff_matrix(matrix_json: &str) -> Result<String, JsError> {
    let matrix: PayoffMatrix = serde_json::from_str(matrix_json)
        .map_err(|e| JsError::new(&format!("Invalid matrix: {}", e)))?;
    Ok(match matrix.validate() {
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    })
}

/// Assemble a program listing and run the admission check on it
///
/// # Returns
/// The bytecode as a byte array
#[wasm_bindgen]
pub fn assemble_program(source: &str) -> Result<Vec<u8>, JsError> {
    let program = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
    admit_program(&program).map_err(|e| JsError::new(&e.to_string()))?;
    Ok(program)
}

/// Check raw bytecode for admission
///
/// Returns an empty string when admissible, otherwise the reason.
#[wasm_bindgen]
pub fn check_program(bytecode: &[u8]) -> String {
    match admit_program(bytecode) {
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    }
}

#[derive(Serialize)]
struct ReplayOutput {
    result: crate::MatchResult,
    rounds: Vec<crate::RoundResult>,
}

/// Replay a single match round by round
///
/// # Arguments
/// * `strategy_a_id` / `strategy_b_id` - Catalog strategy ids
/// * `rounds` - Number of rounds
/// * `noise` - Flip probability
/// * `matrix_json` - Payoff matrix JSON
/// * `seed` - Seed for a fresh random stream
#[wasm_bindgen]
pub fn replay_match(
    strategy_a_id: &str,
    strategy_b_id: &str,
    rounds: u32,
    noise: f64,
    matrix_json: &str,
    seed: u32,
) -> Result<JsValue, JsError> {
    let registry = StrategyRegistry::new();
    let lookup = |id: &str| {
        registry
            .get(id)
            .ok_or_else(|| JsError::new(&format!("Unknown strategy: {}", id)))
    };
    let strategy_a = lookup(strategy_a_id)?;
    let strategy_b = lookup(strategy_b_id)?;
    let matrix: PayoffMatrix = serde_json::from_str(matrix_json)
        .map_err(|e| JsError::new(&format!("Invalid matrix: {}", e)))?;

    let mut rng = SeededRng::new(seed);
    let (result, rounds) = checked_replay_match(strategy_a, strategy_b, rounds, noise, &matrix, &mut rng)
        .map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&ReplayOutput { result, rounds })
}
