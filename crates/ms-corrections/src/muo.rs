//! Muon corrections: momentum scale and per-correction scale factors.

use ms_columnar::Collection;
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Add the corrected-pt field `corr_pt` to a muon collection.
pub fn muon_corr(muons: &mut Collection, cfg: &CorrectionsConfig) -> Result<()> {
    let pt = muons.require_field("pt")?;
    let corr: Vec<f64> = pt.iter().map(|&p| p * cfg.muon.scale).collect();
    muons.set_field("corr_pt", corr)?;
    Ok(())
}

/// Add one scale-factor field (`sf_id`, `sf_iso`, ...) looked up over
/// (corrected pt, |eta|). Composable: call once per correction name.
pub fn muon_sf(muons: &mut Collection, sf_name: &str, cfg: &CorrectionsConfig) -> Result<()> {
    let table = cfg.muon.sf.get(sf_name).ok_or_else(|| {
        Error::Config(format!(
            "no muon scale factors named '{sf_name}' in era '{}'",
            cfg.era
        ))
    })?;
    let pt = if muons.has_field("corr_pt") {
        muons.require_field("corr_pt")?
    } else {
        muons.require_field("pt")?
    };
    let eta = muons.require_field("eta")?;
    let sf: Vec<f64> =
        pt.iter().zip(eta).map(|(&p, &e)| table.lookup(p, e.abs())).collect();
    muons.set_field(&format!("sf_{sf_name}"), sf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::BinnedTable2;

    fn cfg() -> CorrectionsConfig {
        let mut cfg = CorrectionsConfig { era: "2022preEE".into(), ..Default::default() };
        cfg.muon.sf.insert(
            "id".into(),
            BinnedTable2 {
                x_edges: vec![0.0, 1000.0],
                y_edges: vec![0.0, 2.4],
                values: vec![0.97],
            },
        );
        cfg.muon.sf.insert(
            "iso".into(),
            BinnedTable2 {
                x_edges: vec![0.0, 1000.0],
                y_edges: vec![0.0, 2.4],
                values: vec![0.99],
            },
        );
        cfg
    }

    #[test]
    fn sf_fields_compose_per_name() {
        let mut muons = Collection::from_fields(
            vec![0, 2],
            [("pt".to_string(), vec![30.0, 50.0]), ("eta".to_string(), vec![0.1, -1.5])],
        )
        .unwrap();
        muon_sf(&mut muons, "id", &cfg()).unwrap();
        muon_sf(&mut muons, "iso", &cfg()).unwrap();
        assert_eq!(muons.field("sf_id").unwrap(), &[0.97, 0.97]);
        assert_eq!(muons.field("sf_iso").unwrap(), &[0.99, 0.99]);
    }

    #[test]
    fn unknown_sf_name_rejected() {
        let mut muons =
            Collection::from_fields(vec![0, 1], [("pt".to_string(), vec![30.0])]).unwrap();
        assert!(muon_sf(&mut muons, "trigger", &cfg()).is_err());
    }
}
