//! Tau corrections: decay-mode filtering, fake-rate scale factors, energy
//! scale.

use ms_columnar::Collection;
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Working points of the three tau discriminators.
#[derive(Debug, Clone)]
pub struct TauWorkingPoints {
    /// Electron-to-tau fake rate working point.
    pub vs_e: String,
    /// Muon-to-tau fake rate working point.
    pub vs_mu: String,
    /// Jet-to-tau fake rate working point.
    pub vs_jet: String,
}

/// Variable the jet-fake scale factor is binned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfDependency {
    /// pt-binned scale factors.
    Pt,
    /// Decay-mode-binned scale factors.
    DecayMode,
}

/// Filter the tau collection to the supported decay modes (0, 1, 10, 11),
/// add per-object fake-rate fields `sf_vs_e` / `sf_vs_mu` / `sf_vs_jet`, and
/// the energy-scaled `corr_pt` / `corr_mass` fields.
pub fn tau_sf_corr(
    taus: &Collection,
    working_points: &TauWorkingPoints,
    cfg: &CorrectionsConfig,
    dependency: SfDependency,
) -> Result<Collection> {
    let dm_ok = taus.object_mask("decayMode", |dm| dm <= 1.0 || dm >= 10.0)?;
    let mut taus = taus.retain_objects(&dm_ok)?;

    let lookups = [
        ("sf_vs_e", &working_points.vs_e, "eta"),
        ("sf_vs_mu", &working_points.vs_mu, "eta"),
        ("sf_vs_jet", &working_points.vs_jet, ""),
    ];
    for (field, wp, axis) in lookups {
        let key = format!("{}:{wp}", field.trim_start_matches("sf_"));
        let table = cfg.tau.fake_rate.get(&key).ok_or_else(|| {
            Error::Config(format!("no tau fake-rate table '{key}' in era '{}'", cfg.era))
        })?;
        let source = if axis.is_empty() {
            match dependency {
                SfDependency::Pt => taus.require_field("pt")?,
                SfDependency::DecayMode => taus.require_field("decayMode")?,
            }
        } else {
            taus.require_field(axis)?
        };
        let sf: Vec<f64> = source
            .iter()
            .map(|&x| if axis == "eta" { table.lookup(x.abs()) } else { table.lookup(x) })
            .collect();
        taus.set_field(field, sf)?;
    }

    let pt: Vec<f64> =
        taus.require_field("pt")?.iter().map(|&p| p * cfg.tau.scale).collect();
    let mass: Vec<f64> =
        taus.require_field("mass")?.iter().map(|&m| m * cfg.tau.scale).collect();
    taus.set_field("corr_pt", pt)?;
    taus.set_field("corr_mass", mass)?;
    Ok(taus)
}
