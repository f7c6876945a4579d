//! Per-era calibration configuration.
//!
//! One JSON file per era under `<data_dir>/corrections/<era>.json` holds every
//! calibration table the correction routines need. Loading an era with no
//! file is an [`Error::UnsupportedEra`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ms_core::{Error, Result};

use crate::table::{BinnedTable, BinnedTable2};

/// Electron calibration: energy-scale factor plus ID scale-factor tables per
/// working point over (pt, |eta|).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectronTables {
    /// Multiplicative energy-scale factor applied to `pt`.
    #[serde(default = "unit")]
    pub scale: f64,
    /// ID scale factors keyed by working point ("Tight", "Medium", ...).
    #[serde(default)]
    pub sf: BTreeMap<String, BinnedTable2>,
}

/// Muon calibration, same shape as [`ElectronTables`]; the scale-factor map
/// is keyed by correction name ("id", "iso").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuonTables {
    /// Multiplicative momentum-scale factor applied to `pt`.
    #[serde(default = "unit")]
    pub scale: f64,
    /// Scale factors keyed by correction name.
    #[serde(default)]
    pub sf: BTreeMap<String, BinnedTable2>,
}

/// Tau calibration: fake-rate scale factors per discriminator and the energy
/// scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TauTables {
    /// Energy-scale factor applied to `pt` and `mass`.
    #[serde(default = "unit")]
    pub scale: f64,
    /// Fake-rate tables keyed by `"{discriminator}:{working_point}"`
    /// (e.g. `"vs_jet:Medium"`), binned in pt or decay mode.
    #[serde(default)]
    pub fake_rate: BTreeMap<String, BinnedTable>,
}

/// One rectangular eta-phi region of a jet veto map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EtaPhiRegion {
    /// Lower eta bound (inclusive).
    pub eta_min: f64,
    /// Upper eta bound (exclusive).
    pub eta_max: f64,
    /// Lower phi bound (inclusive).
    pub phi_min: f64,
    /// Upper phi bound (exclusive).
    pub phi_max: f64,
}

impl EtaPhiRegion {
    /// Whether a point falls inside the region.
    pub fn contains(&self, eta: f64, phi: f64) -> bool {
        eta >= self.eta_min && eta < self.eta_max && phi >= self.phi_min && phi < self.phi_max
    }
}

/// Jet calibration: ID thresholds, energy-correction factors, veto maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JetTables {
    /// Minimum `jetId` value per working point name.
    #[serde(default)]
    pub id_thresholds: BTreeMap<String, f64>,
    /// pt-binned energy-correction factor.
    #[serde(default)]
    pub jerc: Option<BinnedTable>,
    /// Named veto maps, each a list of excluded eta-phi regions.
    #[serde(default)]
    pub veto_maps: BTreeMap<String, Vec<EtaPhiRegion>>,
}

/// B-tagging calibration for one tagger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BtagTables {
    /// Discriminant threshold per working point ("L", "M", "T", ...).
    #[serde(default)]
    pub wp_values: BTreeMap<String, f64>,
    /// Scale factors over (pt, |eta|).
    #[serde(default)]
    pub sf: Option<BinnedTable2>,
}

fn unit() -> f64 {
    1.0
}

/// All calibration tables for one era.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionsConfig {
    /// The era this file describes.
    pub era: String,
    /// Pileup weight binned in the true number of interactions.
    #[serde(default)]
    pub pileup: Option<BinnedTable>,
    /// Electron tables.
    #[serde(default)]
    pub electron: ElectronTables,
    /// Muon tables.
    #[serde(default)]
    pub muon: MuonTables,
    /// Tau tables.
    #[serde(default)]
    pub tau: TauTables,
    /// Jet tables.
    #[serde(default)]
    pub jets: JetTables,
    /// B-tag tables keyed by tagger name ("deepJet", "particleNet", ...).
    #[serde(default)]
    pub btag: BTreeMap<String, BtagTables>,
    /// Relative path of the golden-lumi JSON for this era (data only).
    #[serde(default)]
    pub golden_json: Option<String>,
}

impl CorrectionsConfig {
    /// Load the calibration file for one era from
    /// `<data_dir>/corrections/<era>.json`.
    pub fn for_era(data_dir: &Path, era: &str) -> Result<Self> {
        let path = data_dir.join("corrections").join(format!("{era}.json"));
        if !path.exists() {
            return Err(Error::UnsupportedEra(era.to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate every table shape once at load time.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = &self.pileup {
            t.validate("pileup")?;
        }
        for (wp, t) in &self.electron.sf {
            t.validate(&format!("electron.sf.{wp}"))?;
        }
        for (name, t) in &self.muon.sf {
            t.validate(&format!("muon.sf.{name}"))?;
        }
        for (key, t) in &self.tau.fake_rate {
            t.validate(&format!("tau.fake_rate.{key}"))?;
        }
        if let Some(t) = &self.jets.jerc {
            t.validate("jets.jerc")?;
        }
        for (tagger, tables) in &self.btag {
            if let Some(t) = &tables.sf {
                t.validate(&format!("btag.{tagger}.sf"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_era_file_is_unsupported_era() {
        let err =
            CorrectionsConfig::for_era(Path::new("/nonexistent"), "1999").unwrap_err();
        assert!(matches!(err, Error::UnsupportedEra(e) if e == "1999"));
    }

    #[test]
    fn region_containment_half_open() {
        let r = EtaPhiRegion { eta_min: 1.0, eta_max: 2.0, phi_min: -1.0, phi_max: 0.0 };
        assert!(r.contains(1.0, -1.0));
        assert!(r.contains(1.5, -0.5));
        assert!(!r.contains(2.0, -0.5));
        assert!(!r.contains(1.5, 0.0));
    }

    #[test]
    fn validate_rejects_bad_table() {
        let cfg = CorrectionsConfig {
            era: "2022preEE".into(),
            pileup: Some(BinnedTable { edges: vec![0.0], values: vec![1.0] }),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
