//! Named panel store.
//!
//! An explicit catalog handed by reference to whoever loads or inspects data.
//! The simulator itself only ever sees plain panels.

use crate::domain::error::EbuissError;
use crate::domain::panel::Panel;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PanelInfo {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub first_period: Option<NaiveDate>,
    pub last_period: Option<NaiveDate>,
    pub description: String,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    panel: Panel,
    description: String,
}

#[derive(Debug, Clone, Default)]
pub struct PanelCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PanelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        panel: Panel,
        description: &str,
        overwrite: bool,
    ) -> Result<(), EbuissError> {
        if !overwrite && self.entries.contains_key(name) {
            return Err(EbuissError::invalid_input(format!(
                "panel '{name}' is already registered"
            )));
        }
        self.entries.insert(
            name.to_string(),
            CatalogEntry {
                panel,
                description: description.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Panel, EbuissError> {
        self.entries
            .get(name)
            .map(|e| &e.panel)
            .ok_or_else(|| EbuissError::invalid_input(format!("panel '{name}' is not registered")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn info(&self, name: &str) -> Result<PanelInfo, EbuissError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| EbuissError::invalid_input(format!("panel '{name}' is not registered")))?;
        let periods = entry.panel.periods();
        Ok(PanelInfo {
            name: name.to_string(),
            rows: entry.panel.len(),
            cols: entry.panel.instruments().len(),
            first_period: periods.first().copied(),
            last_period: periods.last().copied(),
            description: entry.description.clone(),
        })
    }
}
