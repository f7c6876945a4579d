//! Typed configuration for one selection pass.
//!
//! The original framework threaded a loosely-typed metadata dictionary through
//! every function. Here the configuration is a struct with named fields,
//! deserialized from JSON and validated once at load time; selection and
//! correction routines receive it by shared reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Output-tree structure: ordered mapping from output branch name to a source
/// spec over the event batch.
///
/// A spec ending in `"."` copies a whole collection (`"Jet_selected."`);
/// `"field.subfield"` copies one collection column; a bare `"field"` copies a
/// scalar column.
pub type TreeStructure = BTreeMap<String, String>;

/// Composition of one event-weight field from named input fields.
///
/// Dotted specs (`"Electron.sf_id"`) reference collection columns; jagged
/// factors are reduced by per-event product before multiplying.
pub type WeightConfig = BTreeMap<String, Vec<String>>;

/// One trigger group: the HLT paths it ORs together and the datasets for
/// which the group is authoritative when running on data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerGroup {
    /// HLT path names belonging to this group.
    pub triggers: Vec<String>,
    /// Dataset names this group is authoritative for (data only).
    #[serde(default)]
    pub datasets: Vec<String>,
}

/// Named trigger groups for one era (e.g. "ee", "se", "mumu", "smu", "emu").
pub type TriggerMenu = BTreeMap<String, TriggerGroup>;

/// Configuration for one selection pass over one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Data-taking era (e.g. "2022preEE", "2024").
    pub era: String,
    /// Sample/process name; for data the dataset is derived from its suffix.
    pub process: String,
    /// True for collision data, false for simulation.
    pub is_data: bool,
    /// True for signal simulation (enables generator-level step-0 snapshots).
    #[serde(default)]
    pub is_signal: bool,
    /// Base directory for calibration data files.
    #[serde(default)]
    pub data_dir: PathBuf,
    /// Output minitree structure.
    pub structure: TreeStructure,
    /// Event-weight composition (simulation only).
    #[serde(default)]
    pub weights: WeightConfig,
    /// Trigger menu for this era.
    #[serde(default)]
    pub hlt: TriggerMenu,
    /// HLT path names of the run, in the order the fired-path indices refer
    /// to.
    #[serde(default)]
    pub hlt_paths: Vec<String>,
    /// B-tag discriminant thresholds: tagger -> working point -> threshold.
    #[serde(default)]
    pub btag: BTreeMap<String, BTreeMap<String, f64>>,
    /// Weight fields excluded from composition for this pass.
    #[serde(default)]
    pub ban_weights: Vec<String>,
}

impl SelectionConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration. Called once at load time.
    pub fn validate(&self) -> Result<()> {
        if self.era.is_empty() {
            return Err(Error::Config("era must not be empty".into()));
        }
        if self.process.is_empty() {
            return Err(Error::Config("process must not be empty".into()));
        }
        if self.structure.is_empty() {
            return Err(Error::Config("output tree structure is empty".into()));
        }
        for (grp, g) in &self.hlt {
            if g.triggers.is_empty() {
                tracing::warn!("trigger group '{grp}' has no paths configured");
            }
        }
        Ok(())
    }

    /// Dataset identity for data samples: the capitalized suffix of the
    /// process name (`"run2022C_egamma"` -> `"Egamma"`).
    pub fn dataset(&self) -> String {
        let suffix = self.process.rsplit('_').next().unwrap_or("");
        let mut chars = suffix.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SelectionConfig {
        SelectionConfig {
            era: "2022preEE".into(),
            process: "ttbar".into(),
            is_data: false,
            is_signal: false,
            data_dir: PathBuf::new(),
            structure: BTreeMap::from([("weight".into(), "eventWeight".into())]),
            weights: BTreeMap::new(),
            hlt: BTreeMap::new(),
            hlt_paths: Vec::new(),
            btag: BTreeMap::new(),
            ban_weights: Vec::new(),
        }
    }

    #[test]
    fn validate_minimal() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_structure() {
        let mut cfg = minimal();
        cfg.structure.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn dataset_from_suffix() {
        let mut cfg = minimal();
        cfg.process = "run2022C_eGamma".into();
        assert_eq!(cfg.dataset(), "EGamma");
        cfg.process = "run2022D_muonEG".into();
        assert_eq!(cfg.dataset(), "MuonEG");
    }
}
