//! Named filter sets persisted to a local JSON file.
//!
//! ```json
//! {
//!   "open invoices": [
//!     { "column": "status", "operator": "equals", "value": "open" }
//!   ]
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use anyhow::{Context, Result, anyhow, ensure};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::filter::Filter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetStore {
    presets: BTreeMap<String, Vec<Filter>>,
}

impl PresetStore {
    /// Missing files read as an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Preset file {path:?} not found, starting empty");
            return Ok(Self::default());
        }
        let file = File::open(path).with_context(|| format!("Opening preset file {path:?}"))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing preset file {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating preset file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).context("Writing presets JSON")
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&[Filter]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Stores the active filters of `filters` under `name`, replacing any
    /// preset of the same name.
    pub fn insert(&mut self, name: &str, filters: &[Filter]) -> Result<()> {
        let name = name.trim();
        ensure!(!name.is_empty(), "Preset name cannot be empty");
        let active: Vec<Filter> = filters.iter().filter(|f| f.is_active()).cloned().collect();
        ensure!(!active.is_empty(), "Preset '{name}' has no active filters");
        if self.presets.insert(name.to_string(), active).is_some() {
            info!("Replaced preset '{name}'");
        } else {
            info!("Saved preset '{name}'");
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Vec<Filter>> {
        self.presets
            .remove(name)
            .ok_or_else(|| anyhow!("Preset '{name}' not found"))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::filter::Operator;

    #[test]
    fn presets_round_trip_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("presets.json");
        assert!(PresetStore::load(&path).unwrap().is_empty());

        let mut store = PresetStore::default();
        store
            .insert(
                "open",
                &[
                    Filter::new("status", Operator::Equals, "open"),
                    Filter::new("note", Operator::Contains, ""),
                ],
            )
            .unwrap();
        store.save(&path).unwrap();

        let loaded = PresetStore::load(&path).unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["open"]);
        assert_eq!(loaded.get("open").unwrap().len(), 1);
    }

    #[test]
    fn empty_presets_and_unknown_names_are_rejected() {
        let mut store = PresetStore::default();
        assert!(store.insert("  ", &[Filter::new("a", Operator::IsEmpty, "")]).is_err());
        assert!(store.insert("x", &[Filter::new("a", Operator::Equals, "")]).is_err());
        assert!(store.remove("missing").is_err());
    }
}
