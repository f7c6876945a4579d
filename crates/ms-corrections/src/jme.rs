//! Jet corrections: ID selection, veto maps, energy corrections.

use ms_columnar::Collection;
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Keep only the jets whose `jetId` value reaches the working point's
/// threshold.
pub fn jet_id(jets: &Collection, working_point: &str, cfg: &CorrectionsConfig) -> Result<Collection> {
    let threshold = *cfg.jets.id_thresholds.get(working_point).ok_or_else(|| {
        Error::Config(format!(
            "no jet ID threshold for working point '{working_point}' in era '{}'",
            cfg.era
        ))
    })?;
    let keep = jets.object_mask("jetId", |id| id >= threshold)?;
    jets.retain_objects(&keep)
}

/// Per-object pass mask for a named veto map: true when the jet lies in none
/// of the map's excluded eta-phi regions.
pub fn veto_map(jets: &Collection, map_name: &str, cfg: &CorrectionsConfig) -> Result<Vec<bool>> {
    let regions = cfg.jets.veto_maps.get(map_name).ok_or_else(|| {
        Error::Config(format!("no jet veto map '{map_name}' in era '{}'", cfg.era))
    })?;
    let eta = jets.require_field("eta")?;
    let phi = jets.require_field("phi")?;
    Ok(eta
        .iter()
        .zip(phi)
        .map(|(&e, &p)| !regions.iter().any(|r| r.contains(e, p)))
        .collect())
}

/// Add the energy-corrected `corr_pt` field from the pt-binned correction
/// factor. Eras without a correction table keep the uncorrected pt.
pub fn jet_jerc(jets: &mut Collection, cfg: &CorrectionsConfig) -> Result<()> {
    let pt = jets.require_field("pt")?;
    let corr: Vec<f64> = match &cfg.jets.jerc {
        Some(table) => pt.iter().map(|&p| p * table.lookup(p)).collect(),
        None => {
            tracing::warn!("no jet energy corrections for era '{}'", cfg.era);
            pt.to_vec()
        }
    };
    jets.set_field("corr_pt", corr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtaPhiRegion;
    use crate::table::BinnedTable;

    fn jets() -> Collection {
        Collection::from_fields(
            vec![0, 3],
            [
                ("pt".to_string(), vec![40.0, 80.0, 25.0]),
                ("eta".to_string(), vec![0.5, 2.8, -1.0]),
                ("phi".to_string(), vec![0.1, 1.5, -2.0]),
                ("jetId".to_string(), vec![6.0, 2.0, 6.0]),
            ],
        )
        .unwrap()
    }

    fn cfg() -> CorrectionsConfig {
        let mut cfg = CorrectionsConfig { era: "2022preEE".into(), ..Default::default() };
        cfg.jets.id_thresholds.insert("TightLeptonVeto".into(), 6.0);
        cfg.jets.veto_maps.insert(
            "jetvetomap".into(),
            vec![EtaPhiRegion { eta_min: 2.5, eta_max: 3.0, phi_min: 1.0, phi_max: 2.0 }],
        );
        cfg.jets.jerc =
            Some(BinnedTable { edges: vec![0.0, 50.0, 500.0], values: vec![1.1, 1.0] });
        cfg
    }

    #[test]
    fn jet_id_filters_below_threshold() {
        let out = jet_id(&jets(), "TightLeptonVeto", &cfg()).unwrap();
        assert_eq!(out.field("pt").unwrap(), &[40.0, 25.0]);
    }

    #[test]
    fn veto_map_flags_regions() {
        assert_eq!(veto_map(&jets(), "jetvetomap", &cfg()).unwrap(), vec![true, false, true]);
    }

    #[test]
    fn jerc_scales_low_pt_bin() {
        use approx::assert_relative_eq;
        let mut j = jets();
        jet_jerc(&mut j, &cfg()).unwrap();
        let corr = j.field("corr_pt").unwrap();
        assert_relative_eq!(corr[0], 44.0, max_relative = 1e-12);
        assert_relative_eq!(corr[1], 80.0);
        assert_relative_eq!(corr[2], 27.5, max_relative = 1e-12);
    }
}
