//! Strategy registry: the built-in catalog plus admitted custom programs

use log::{debug, info};

use crate::error::{ConfigError, RegistryError};
use crate::strategy::{all_strategies, Strategy, StrategyKind};
use crate::vm::admit_program;

/// Ordered set of strategies a run may select from
#[derive(Clone, Debug)]
pub struct StrategyRegistry {
    strategies: Vec<Strategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Registry preloaded with the built-in and community strategies
    pub fn new() -> Self {
        Self { strategies: all_strategies() }
    }

    pub fn empty() -> Self {
        Self { strategies: Vec::new() }
    }

    /// Add a strategy.
    ///
    /// Custom programs must pass static validation and run cleanly on every
    /// sample history before they are accepted.
    pub fn register(&mut self, strategy: Strategy) -> Result<(), RegistryError> {
        if strategy.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.get(&strategy.id).is_some() {
            return Err(RegistryError::DuplicateId(strategy.id));
        }
        if let StrategyKind::Custom { program } = &strategy.kind {
            admit_program(program).map_err(|source| RegistryError::Rejected {
                id: strategy.id.clone(),
                source,
            })?;
            info!("admitted custom strategy `{}` ({} bytes)", strategy.id, program.len());
        } else {
            debug!("registered strategy `{}`", strategy.id);
        }
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Resolve an ordered id selection, keeping the selection's order.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Strategy>, ConfigError> {
        if ids.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        let mut selected: Vec<Strategy> = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if selected.iter().any(|s| s.id == id) {
                return Err(ConfigError::DuplicateStrategy(id.to_string()));
            }
            let strategy = self
                .get(id)
                .ok_or_else(|| ConfigError::UnknownStrategy(id.to_string()))?;
            selected.push(strategy.clone());
        }
        Ok(selected)
    }
}
