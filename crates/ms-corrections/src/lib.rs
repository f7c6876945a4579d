//! # ms-corrections
//!
//! Object-correction collaborators for the minisel pipeline: pure functions
//! over collections and batches, driven by per-era calibration tables loaded
//! from JSON. Numerical recipes are simple binned lookups; the contract is
//! the interface (which fields appear, which objects survive).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod btv;
pub mod config;
pub mod defects;
pub mod egm;
pub mod jme;
pub mod lum;
pub mod muo;
pub mod table;
pub mod tau;

pub use btv::btagging;
pub use config::{CorrectionsConfig, EtaPhiRegion};
pub use defects::detector_defects_mask;
pub use egm::{electron_corr, electron_sf};
pub use jme::{jet_id, jet_jerc, veto_map};
pub use lum::{apply_golden_json, pileup_weights, LumiMask};
pub use muo::{muon_corr, muon_sf};
pub use table::{BinnedTable, BinnedTable2};
pub use tau::{tau_sf_corr, SfDependency, TauWorkingPoints};
