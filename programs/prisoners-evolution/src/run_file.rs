//! JSON run files: a configuration, custom strategies and an optional sweep

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use evolution_logic::vm::assemble;
use evolution_logic::{SimulationConfig, Strategy, StrategyRegistry, SweepVariations};

/// A user strategy written in VM assembly
#[derive(Debug, Clone, Deserialize)]
pub struct CustomStrategy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub author: String,
    /// e.g. `"OPP_LAST RETURN"`
    pub source: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunFile {
    pub config: SimulationConfig,
    pub custom: Vec<CustomStrategy>,
    pub sweep: Option<SweepVariations>,
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid run file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Catalog registry with this file's custom strategies admitted
    pub fn registry(&self) -> Result<StrategyRegistry> {
        let mut registry = StrategyRegistry::new();
        for custom in &self.custom {
            let program = assemble(&custom.source)
                .with_context(|| format!("failed to assemble strategy `{}`", custom.id))?;
            registry.register(Strategy::custom(
                custom.id.clone(),
                custom.name.clone(),
                custom.author.clone(),
                program,
            ))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let run = RunFile::parse("{}").unwrap();
        assert_eq!(run.config, SimulationConfig::default());
        assert!(run.custom.is_empty());
        assert!(run.sweep.is_none());
    }

    #[test]
    fn test_custom_strategies_are_admitted() {
        let run = RunFile::parse(
            r#"{
                "config": {"selected_strategies": ["mirror", "alwaysDefect"]},
                "custom": [{"id": "mirror", "name": "Mirror", "source": "OPP_LAST RETURN"}]
            }"#,
        )
        .unwrap();
        let registry = run.registry().unwrap();
        assert!(registry.get("mirror").unwrap().is_custom());
        assert_eq!(registry.resolve(&run.config.selected_strategies).unwrap().len(), 2);
    }

    #[test]
    fn test_bad_program_is_reported() {
        let run = RunFile::parse(r#"{"custom": [{"id": "x", "name": "X", "source": "PUSH 9 RETURN"}]}"#).unwrap();
        let err = run.registry().unwrap_err();
        assert!(err.to_string().contains("rejected"));

        let run = RunFile::parse(r#"{"custom": [{"id": "y", "name": "Y", "source": "JUMP"}]}"#).unwrap();
        let err = run.registry().unwrap_err();
        assert!(err.to_string().contains("failed to assemble strategy `y`"));
    }

    #[test]
    fn test_demo_files_load() {
        let classic = RunFile::parse(include_str!("../../../demos/classic.json")).unwrap();
        let registry = classic.registry().unwrap();
        assert_eq!(registry.resolve(&classic.config.selected_strategies).unwrap().len(), 5);

        let sweep = RunFile::parse(include_str!("../../../demos/noise-sweep.json")).unwrap();
        assert_eq!(sweep.sweep.unwrap().combinations(), 8);
    }

    #[test]
    fn test_sweep_runs_to_completion() {
        let mut run = RunFile::parse(include_str!("../../../demos/noise-sweep.json")).unwrap();
        run.config.rounds = 5;
        run.config.generations = 3;
        run.config.replications = 1;
        let registry = run.registry().unwrap();
        let reports = evolution_logic::run_sweep(&run.config, run.sweep.as_ref().unwrap(), &registry).unwrap();
        assert_eq!(reports.len(), 8);
        assert!(reports.iter().all(|r| !r.cancelled && r.generations_completed() == 3));
    }

    #[test]
    fn test_sweep_section() {
        let run = RunFile::parse(r#"{"sweep": {"noise": [0.0, 0.05, 0.1]}}"#).unwrap();
        assert_eq!(run.sweep.unwrap().combinations(), 3);
    }
}
