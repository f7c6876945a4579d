//! Object-level selection helpers shared by the strategies: trailing pt
//! cuts, lepton merging and pairing, candidate building, MET filters.

use ms_columnar::{delta_r, p4_sum_columns, Collection, EventBatch, Mask, SENTINEL};
use ms_core::Result;

/// Per-object mask applying a harder cut to the leading object: the first
/// object of each event must pass `leading_min`, later objects
/// `subleading_min`.
pub fn trailing_selection(
    coll: &Collection,
    field: &str,
    leading_min: f64,
    subleading_min: f64,
) -> Result<Vec<bool>> {
    let values = coll.require_field(field)?;
    let mut keep = Vec::with_capacity(coll.n_objects());
    for w in coll.offsets().windows(2) {
        for i in w[0]..w[1] {
            let min = if i == w[0] { leading_min } else { subleading_min };
            keep.push(values[i] > min);
        }
    }
    Ok(keep)
}

/// Fields shared by two collections, plus every scale-factor field of either
/// side (those are filled with unit weight where a flavor lacks them).
fn common_fields(a: &Collection, b: &Collection) -> Vec<String> {
    let mut fields = Vec::new();
    for name in a.field_names().iter().chain(b.field_names()) {
        if fields.contains(name) {
            continue;
        }
        if (a.has_field(name) && b.has_field(name)) || name.starts_with("sf_") {
            fields.push(name.clone());
        }
    }
    fields
}

/// Merge electrons and muons (and optionally taus) into one lepton
/// collection sorted by descending corrected pt.
///
/// Taus get a `pdgId` field derived from their charge before merging.
/// Per-flavor scale-factor fields are carried through with unit fill on
/// flavors that lack them.
pub fn lepton_merging(batch: &EventBatch, include_tau: bool) -> Result<Collection> {
    let electrons = batch.require_collection("Electron")?;
    let muons = batch.require_collection("Muon")?;
    let mut fields = common_fields(electrons, muons);

    let merged = if include_tau {
        let taus = batch.require_collection("Tau")?;
        let mut taus = taus.clone();
        let pdg: Vec<f64> =
            taus.require_field("charge")?.iter().map(|&q| -q * 15.0).collect();
        taus.set_field("pdgId", pdg)?;
        fields.retain(|f| taus.has_field(f) || f.starts_with("sf_"));
        electrons.concat_on(muons, &fields)?.concat_on(&taus, &fields)?
    } else {
        electrons.concat_on(muons, &fields)?
    };

    let sort_key = if merged.has_field("corr_pt") { "corr_pt" } else { "pt" };
    merged.sort_desc_by(sort_key)
}

/// Split the merged lepton collection into the negative (`lep`) and positive
/// (`lbar`) candidate, one object per event, padded with the sentinel when a
/// charge is absent.
pub fn dilepton_pairing(leptons: &Collection) -> Result<(Collection, Collection)> {
    let charge = leptons.require_field("charge")?;
    let n = leptons.n_events();
    let offsets: Vec<usize> = (0..=n).collect();
    let mut lep = Collection::new(offsets.clone())?;
    let mut lbar = Collection::new(offsets)?;

    for (coll, want) in [(&mut lep, -1.0), (&mut lbar, 1.0)] {
        let picks: Vec<Option<usize>> = leptons
            .offsets()
            .windows(2)
            .map(|w| (w[0]..w[1]).find(|&i| charge[i] == want))
            .collect();
        for name in leptons.field_names() {
            let values = leptons.require_field(name)?;
            let column: Vec<f64> =
                picks.iter().map(|p| p.map_or(SENTINEL, |i| values[i])).collect();
            coll.set_field(name, column)?;
        }
    }
    Ok((lep, lbar))
}

/// Per-event 4-vector sum of two single-object collections (the dilepton
/// candidate). Uses corrected pt where available; sentinel legs propagate.
pub fn four_vector_sum(lep: &Collection, lbar: &Collection) -> Result<Collection> {
    let pt_field = if lep.has_field("corr_pt") { "corr_pt" } else { "pt" };
    let (pt, eta, phi, mass) = p4_sum_columns(
        lep.require_field(pt_field)?,
        lep.require_field("eta")?,
        lep.require_field("phi")?,
        lep.require_field("mass")?,
        lbar.require_field(pt_field)?,
        lbar.require_field("eta")?,
        lbar.require_field("phi")?,
        lbar.require_field("mass")?,
    );
    let offsets: Vec<usize> = (0..=lep.n_events()).collect();
    Collection::from_fields(
        offsets,
        [
            ("pt".to_string(), pt),
            ("eta".to_string(), eta),
            ("phi".to_string(), phi),
            ("mass".to_string(), mass),
        ],
    )
}

/// Annotate each jet with its ΔR to the event's `lep` and `lbar` candidates.
pub fn annotate_jet_delta_r(
    jets: &mut Collection,
    lep: &Collection,
    lbar: &Collection,
) -> Result<()> {
    for (out, cand) in [("DeltaR_lep", lep), ("DeltaR_lbar", lbar)] {
        let cand_eta = cand.require_field("eta")?;
        let cand_phi = cand.require_field("phi")?;
        let jet_eta = jets.require_field("eta")?;
        let jet_phi = jets.require_field("phi")?;
        let mut values = Vec::with_capacity(jets.n_objects());
        for (row, w) in jets.offsets().windows(2).enumerate() {
            for i in w[0]..w[1] {
                values.push(delta_r(jet_eta[i], jet_phi[i], cand_eta[row], cand_phi[row]));
            }
        }
        jets.set_field(out, values)?;
    }
    Ok(())
}

/// MET-filter flags recommended for Run 3.
const MET_FILTER_FLAGS: &[&str] = &[
    "goodVertices",
    "globalSuperTightHalo2016Filter",
    "EcalDeadCellTriggerPrimitiveFilter",
    "BadPFMuonFilter",
    "BadPFMuonDzFilter",
    "hfNoisyHitsFilter",
    "eeBadScFilter",
];

/// Conjunction of the era's MET-filter flags. 2024 adds
/// `ecalBadCalibFilter`.
pub fn met_filter_mask(batch: &EventBatch, era: &str) -> Result<Mask> {
    let mut mask = Mask::trues(batch.n_events());
    let mut flags: Vec<&str> = MET_FILTER_FLAGS.to_vec();
    if era == "2024" {
        flags.push("ecalBadCalibFilter");
    }
    for flag in flags {
        mask.and_assign(&batch.mask_bool(&format!("Flag_{flag}"))?);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn trailing_cut_is_harder_on_leading() {
        let c = Collection::from_fields(
            vec![0, 3, 4],
            [("corr_pt".to_string(), vec![24.0, 22.0, 18.0, 30.0])],
        )
        .unwrap();
        // Leading needs > 25, trailing > 20.
        assert_eq!(
            trailing_selection(&c, "corr_pt", 25.0, 20.0).unwrap(),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn pairing_splits_by_charge_with_padding() {
        let leptons = Collection::from_fields(
            vec![0, 2, 3],
            [
                ("pt".to_string(), vec![40.0, 30.0, 25.0]),
                ("charge".to_string(), vec![-1.0, 1.0, 1.0]),
                ("pdgId".to_string(), vec![11.0, -11.0, -13.0]),
            ],
        )
        .unwrap();
        let (lep, lbar) = dilepton_pairing(&leptons).unwrap();
        assert_eq!(lep.field("pt").unwrap(), &[40.0, SENTINEL]);
        assert_eq!(lbar.field("pt").unwrap(), &[30.0, 25.0]);
        assert_eq!(lep.field("pdgId").unwrap(), &[11.0, SENTINEL]);
        assert_eq!(lbar.field("pdgId").unwrap(), &[-11.0, -13.0]);
    }

    #[test]
    fn merging_sorts_by_corrected_pt_and_fills_sf() {
        let mut batch = EventBatch::new(1);
        batch
            .set_collection(
                "Electron",
                Collection::from_fields(
                    vec![0, 1],
                    [
                        ("pt".to_string(), vec![28.0]),
                        ("corr_pt".to_string(), vec![28.5]),
                        ("charge".to_string(), vec![-1.0]),
                        ("sf_id".to_string(), vec![0.95]),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        batch
            .set_collection(
                "Muon",
                Collection::from_fields(
                    vec![0, 1],
                    [
                        ("pt".to_string(), vec![35.0]),
                        ("corr_pt".to_string(), vec![35.1]),
                        ("charge".to_string(), vec![1.0]),
                        ("sf_iso".to_string(), vec![0.99]),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        let leptons = lepton_merging(&batch, false).unwrap();
        assert_eq!(leptons.field("corr_pt").unwrap(), &[35.1, 28.5]);
        // The electron-only SF is unit-filled for the muon.
        assert_eq!(leptons.field("sf_id").unwrap(), &[1.0, 0.95]);
        assert_eq!(leptons.field("sf_iso").unwrap(), &[0.99, 1.0]);
    }

    #[test]
    fn candidate_mass_from_back_to_back_pair() {
        let mk = |phi: f64, charge: f64| {
            Collection::from_fields(
                vec![0, 1],
                [
                    ("pt".to_string(), vec![50.0]),
                    ("eta".to_string(), vec![0.0]),
                    ("phi".to_string(), vec![phi]),
                    ("mass".to_string(), vec![0.0]),
                    ("charge".to_string(), vec![charge]),
                ],
            )
            .unwrap()
        };
        let llbar = four_vector_sum(&mk(0.0, -1.0), &mk(std::f64::consts::PI, 1.0)).unwrap();
        assert_relative_eq!(llbar.field("mass").unwrap()[0], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn met_filters_and_all_flags() {
        let mut batch = EventBatch::new(2);
        for flag in MET_FILTER_FLAGS {
            batch.set_bools(&format!("Flag_{flag}"), vec![true, true]).unwrap();
        }
        batch.set_bools("Flag_ecalBadCalibFilter", vec![true, false]).unwrap();
        batch.set_bools("Flag_goodVertices", vec![true, false]).unwrap();
        let mask = met_filter_mask(&batch, "2022preEE").unwrap();
        assert_eq!(mask.to_bools(), vec![true, false]);
        // 2024 additionally requires ecalBadCalibFilter.
        let mask = met_filter_mask(&batch, "2024").unwrap();
        assert_eq!(mask.to_bools(), vec![true, false]);
    }
}
