//! Electron corrections: energy scale and ID scale factors.

use ms_columnar::Collection;
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Add the corrected-pt field `corr_pt` to an electron collection.
pub fn electron_corr(electrons: &mut Collection, cfg: &CorrectionsConfig) -> Result<()> {
    let pt = electrons.require_field("pt")?;
    let corr: Vec<f64> = pt.iter().map(|&p| p * cfg.electron.scale).collect();
    electrons.set_field("corr_pt", corr)?;
    tracing::debug!("applied electron energy scale {}", cfg.electron.scale);
    Ok(())
}

/// Add the per-object ID scale-factor field `sf_id` for one working point,
/// looked up over (corrected pt, |eta|).
pub fn electron_sf(
    electrons: &mut Collection,
    working_point: &str,
    cfg: &CorrectionsConfig,
) -> Result<()> {
    let table = cfg.electron.sf.get(working_point).ok_or_else(|| {
        Error::Config(format!(
            "no electron scale factors for working point '{working_point}' in era '{}'",
            cfg.era
        ))
    })?;
    let pt = if electrons.has_field("corr_pt") {
        electrons.require_field("corr_pt")?
    } else {
        electrons.require_field("pt")?
    };
    let eta = electrons.require_field("eta")?;
    let sf: Vec<f64> =
        pt.iter().zip(eta).map(|(&p, &e)| table.lookup(p, e.abs())).collect();
    electrons.set_field("sf_id", sf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::BinnedTable2;
    use approx::assert_relative_eq;

    fn electrons() -> Collection {
        Collection::from_fields(
            vec![0, 2, 3],
            [
                ("pt".to_string(), vec![30.0, 60.0, 45.0]),
                ("eta".to_string(), vec![0.4, -1.8, 2.1]),
            ],
        )
        .unwrap()
    }

    fn cfg() -> CorrectionsConfig {
        let mut cfg = CorrectionsConfig { era: "2022preEE".into(), ..Default::default() };
        cfg.electron.scale = 1.01;
        cfg.electron.sf.insert(
            "Tight".into(),
            BinnedTable2 {
                x_edges: vec![0.0, 50.0, 200.0],
                y_edges: vec![0.0, 1.2, 2.5],
                values: vec![0.95, 0.90, 0.98, 0.93],
            },
        );
        cfg
    }

    #[test]
    fn corr_pt_scales() {
        let mut e = electrons();
        electron_corr(&mut e, &cfg()).unwrap();
        assert_relative_eq!(e.field("corr_pt").unwrap()[0], 30.3);
    }

    #[test]
    fn sf_uses_corrected_pt_and_abs_eta() {
        let mut e = electrons();
        electron_corr(&mut e, &cfg()).unwrap();
        electron_sf(&mut e, "Tight", &cfg()).unwrap();
        let sf = e.field("sf_id").unwrap();
        assert_eq!(sf, &[0.95, 0.98, 0.93]);
    }

    #[test]
    fn unknown_working_point_rejected() {
        let mut e = electrons();
        assert!(electron_sf(&mut e, "Loose", &cfg()).is_err());
    }
}
