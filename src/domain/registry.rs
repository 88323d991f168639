//! Strategy registry: maps strategy ids to factories.
//!
//! Collaborators populate it at startup; nothing here touches the filesystem.

use crate::domain::error::EbuissError;
use crate::domain::strategy::{FactorQuantile, QuantileLongShort, Strategy};
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;

pub type StrategyFactory = fn(&dyn ConfigPort) -> Result<Box<dyn Strategy>, EbuissError>;

struct Entry {
    description: &'static str,
    factory: StrategyFactory,
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, Entry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            QuantileLongShort::ID,
            "long the upper factor quantile, short the lower quantile",
            QuantileLongShort::from_config,
        );
        registry.register(
            FactorQuantile::ID,
            "rank into equal-frequency bins, long one bin and short another",
            FactorQuantile::from_config,
        );
        registry
    }

    /// Register a factory, replacing any previous entry with the same id.
    pub fn register(&mut self, id: &str, description: &'static str, factory: StrategyFactory) {
        self.entries.insert(
            id.to_string(),
            Entry {
                description,
                factory,
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn create(
        &self,
        id: &str,
        config: &dyn ConfigPort,
    ) -> Result<Box<dyn Strategy>, EbuissError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| EbuissError::UnknownStrategy {
                name: id.to_string(),
            })?;
        (entry.factory)(config)
    }

    /// Registered ids, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn description(&self, id: &str) -> Option<&'static str> {
        self.entries.get(id).map(|e| e.description)
    }
}
