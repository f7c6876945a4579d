//! B-tagging: per-event weight and the b-jet collection.

use ms_columnar::{Collection, EventBatch};
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Discriminant field for each supported tagger.
fn tagger_field(tagger: &str) -> Result<&'static str> {
    match tagger {
        "deepJet" => Ok("btagDeepFlavB"),
        "particleNet" => Ok("btagPNetB"),
        "robustParticleTransformer" => Ok("btagRobustParTAK4B"),
        "UParTAK4" => Ok("btagUParTAK4B"),
        other => Err(Error::Config(format!("unsupported b-tagger '{other}'"))),
    }
}

/// Tag b-jets at one working point.
///
/// Adds the per-event `btagWeight` scalar to the batch (the product of
/// scale factors over tagged jets; unit for data) and returns the b-jet
/// collection, the jets whose discriminant exceeds the working point's
/// threshold. NaN discriminants never tag and carry unit weight.
pub fn btagging(
    batch: &mut EventBatch,
    collection: &str,
    tagger: &str,
    working_point: &str,
    cfg: &CorrectionsConfig,
    is_data: bool,
) -> Result<Collection> {
    let tables = cfg
        .btag
        .get(tagger)
        .ok_or_else(|| Error::Config(format!("no b-tag tables for '{tagger}' in era '{}'", cfg.era)))?;
    let threshold = *tables.wp_values.get(working_point).ok_or_else(|| {
        Error::Config(format!(
            "no '{tagger}' threshold for working point '{working_point}' in era '{}'",
            cfg.era
        ))
    })?;

    let jets = batch.require_collection(collection)?.clone();
    let field = tagger_field(tagger)?;
    let score = jets.require_field(field)?;
    let tagged: Vec<bool> = score.iter().map(|&s| !s.is_nan() && s > threshold).collect();

    let weights = if is_data {
        vec![1.0; batch.n_events()]
    } else {
        let sf_table = tables
            .sf
            .as_ref()
            .ok_or_else(|| Error::Config(format!("no '{tagger}' scale factors in era '{}'", cfg.era)))?;
        let pt = jets.require_field("pt")?;
        let eta = jets.require_field("eta")?;
        let mut weights = vec![1.0; batch.n_events()];
        for (row, w) in jets.offsets().windows(2).enumerate() {
            for i in w[0]..w[1] {
                if tagged[i] {
                    weights[row] *= sf_table.lookup(pt[i], eta[i].abs());
                }
            }
        }
        weights
    };
    batch.set_f64s("btagWeight", weights)?;
    jets.retain_objects(&tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BtagTables;
    use crate::table::BinnedTable2;
    use approx::assert_relative_eq;

    fn batch() -> EventBatch {
        let mut b = EventBatch::new(2);
        b.set_collection(
            "Jet_selected",
            Collection::from_fields(
                vec![0, 3, 4],
                [
                    ("pt".to_string(), vec![50.0, 35.0, 80.0, 40.0]),
                    ("eta".to_string(), vec![0.2, -1.0, 2.0, 0.5]),
                    ("btagDeepFlavB".to_string(), vec![0.9, 0.1, f64::NAN, 0.7]),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        b
    }

    fn cfg() -> CorrectionsConfig {
        let mut cfg = CorrectionsConfig { era: "2022preEE".into(), ..Default::default() };
        cfg.btag.insert(
            "deepJet".into(),
            BtagTables {
                wp_values: [("M".to_string(), 0.5)].into(),
                sf: Some(BinnedTable2 {
                    x_edges: vec![0.0, 1000.0],
                    y_edges: vec![0.0, 2.5],
                    values: vec![0.96],
                }),
            },
        );
        cfg
    }

    #[test]
    fn tags_above_threshold_and_weights() {
        let mut b = batch();
        let bjets = btagging(&mut b, "Jet_selected", "deepJet", "M", &cfg(), false).unwrap();
        assert_eq!(bjets.counts(), vec![1, 1]);
        assert_eq!(bjets.field("pt").unwrap(), &[50.0, 40.0]);
        let w = b.f64s("btagWeight").unwrap();
        assert_relative_eq!(w[0], 0.96);
        assert_relative_eq!(w[1], 0.96);
    }

    #[test]
    fn data_gets_unit_weight() {
        let mut b = batch();
        btagging(&mut b, "Jet_selected", "deepJet", "M", &cfg(), true).unwrap();
        assert_eq!(b.f64s("btagWeight").unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn unknown_tagger_rejected() {
        let mut b = batch();
        assert!(btagging(&mut b, "Jet_selected", "softDrop", "M", &cfg(), false).is_err());
    }
}
