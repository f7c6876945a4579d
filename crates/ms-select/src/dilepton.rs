//! Dilepton ttbar selection: object selection, channel definition, and the
//! event-level step sequence with the Z-window fork.

use std::collections::BTreeMap;

use ms_columnar::{make_weight_fields, Collection, EventBatch, Mask};
use ms_core::{Result, SelectionConfig};
use ms_corrections::{
    btagging, electron_corr, electron_sf, jet_id, muon_corr, muon_sf, pileup_weights, veto_map,
    CorrectionsConfig,
};
use ms_cutflow::{CutflowSession, StepMask, INIT_STEP};

use crate::objects::{
    annotate_jet_delta_r, dilepton_pairing, four_vector_sum, lepton_merging, met_filter_mask,
    trailing_selection,
};
use crate::trigger::dilepton_hlt_mask;

/// Minitree key prefix for dilepton snapshots.
pub const STEP_TAG: &str = "ttBar_treeVariables_";

fn select_electrons(batch: &EventBatch, corr: &CorrectionsConfig) -> Result<Collection> {
    let mut electrons = batch.require_collection("Electron")?.clone();
    electron_corr(&mut electrons, corr)?;
    let keep = trailing_selection(&electrons, "corr_pt", 25.0, 20.0)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("corr_pt", |pt| pt > 20.0)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("eta", |eta| eta.abs() < 2.4)?;
    let electrons = electrons.retain_objects(&keep)?;
    // ECAL barrel/endcap transition region
    let keep = electrons.object_mask("eta", |eta| eta.abs() > 1.566 || eta.abs() < 1.4442)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("cutBased", |id| id >= 4.0)?;
    let mut electrons = electrons.retain_objects(&keep)?;
    electron_sf(&mut electrons, "Tight", corr)?;
    Ok(electrons)
}

fn select_muons(batch: &EventBatch, corr: &CorrectionsConfig) -> Result<Collection> {
    let mut muons = batch.require_collection("Muon")?.clone();
    muon_corr(&mut muons, corr)?;
    let keep = trailing_selection(&muons, "corr_pt", 25.0, 20.0)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("corr_pt", |pt| pt > 20.0)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("eta", |eta| eta.abs() < 2.4)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("pfRelIso04_all", |iso| iso < 0.15)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("tightId", |id| id != 0.0)?;
    let mut muons = muons.retain_objects(&keep)?;
    muon_sf(&mut muons, "id", corr)?;
    muon_sf(&mut muons, "iso", corr)?;
    Ok(muons)
}

fn select_jets(
    batch: &EventBatch,
    lep: &Collection,
    lbar: &Collection,
    corr: &CorrectionsConfig,
) -> Result<Collection> {
    let mut jets = batch.require_collection("Jet")?.clone();
    annotate_jet_delta_r(&mut jets, lep, lbar)?;
    let keep = jets.object_mask("pt", |pt| pt > 30.0)?;
    let jets = jets.retain_objects(&keep)?;
    let keep = jets.object_mask("eta", |eta| eta.abs() < 2.4)?;
    let jets = jets.retain_objects(&keep)?;
    let jets = jet_id(&jets, "TightLeptonVeto", corr)?;
    let near_lep = jets.object_mask("DeltaR_lep", |d| d > 0.4)?;
    let near_lbar = jets.object_mask("DeltaR_lbar", |d| d > 0.4)?;
    let keep: Vec<bool> = near_lep.iter().zip(&near_lbar).map(|(&a, &b)| a && b).collect();
    let jets = jets.retain_objects(&keep)?;
    let keep = veto_map(&jets, "jetvetomap", corr)?;
    jets.retain_objects(&keep)
}

/// Per-event channel masks from the signed pdg IDs of the candidate pair.
fn channel_masks(lep: &Collection, lbar: &Collection) -> Result<BTreeMap<String, Mask>> {
    let pdg_lep = lep.require_field("pdgId")?;
    let pdg_lbar = lbar.require_field("pdgId")?;
    let pair = |a: f64, b: f64| -> Vec<bool> {
        pdg_lep.iter().zip(pdg_lbar).map(|(&l, &r)| l == a && r == b).collect()
    };
    let ee = pair(11.0, -11.0);
    let mumu = pair(13.0, -13.0);
    let mu_e = pair(13.0, -11.0);
    let e_mu = pair(11.0, -13.0);
    let emu: Vec<bool> = mu_e.iter().zip(&e_mu).map(|(&a, &b)| a || b).collect();
    Ok(BTreeMap::from([
        ("ee".to_string(), Mask::from_bools(&ee)),
        ("mumu".to_string(), Mask::from_bools(&mumu)),
        ("emu".to_string(), Mask::from_bools(&emu)),
    ]))
}

/// Corrections, object selection, candidate building, and channel
/// definition. Returns the enriched batch and the channel masks the cutflow
/// session is seeded with.
pub fn pre_select(
    cfg: &SelectionConfig,
    corr: &CorrectionsConfig,
    mut batch: EventBatch,
) -> Result<(EventBatch, BTreeMap<String, Mask>)> {
    pileup_weights(&mut batch, corr, cfg.is_data)?;

    let electrons = select_electrons(&batch, corr)?;
    batch.set_collection("Electron", electrons)?;
    let muons = select_muons(&batch, corr)?;
    batch.set_collection("Muon", muons)?;

    let leptons = lepton_merging(&batch, false)?;
    let (lep, lbar) = dilepton_pairing(&leptons)?;
    let llbar = four_vector_sum(&lep, &lbar)?;
    let channels = channel_masks(&lep, &lbar)?;

    let jets = select_jets(&batch, &lep, &lbar, corr)?;
    batch.set_collection("lepton", leptons)?;
    batch.set_collection("lep", lep)?;
    batch.set_collection("lbar", lbar)?;
    batch.set_collection("llbar", llbar)?;
    batch.set_collection("Jet_selected", jets)?;

    let tagger = if matches!(cfg.era.as_str(), "2024" | "2025") {
        "UParTAK4"
    } else {
        "robustParticleTransformer"
    };
    tracing::info!("b-tagging with '{tagger}' at the medium working point");
    let bjets = btagging(&mut batch, "Jet_selected", tagger, "M", corr, cfg.is_data)?;
    batch.set_collection("bJetsAK4", bjets)?;

    if cfg.is_data {
        batch.set_f64s("eventWeight", vec![1.0; batch.n_events()])?;
    } else {
        make_weight_fields(&mut batch, &cfg.weights, &cfg.ban_weights)?;
        if !batch.has_scalar("eventWeight") {
            tracing::warn!("no 'eventWeight' composition configured, using unit weights");
            batch.set_f64s("eventWeight", vec![1.0; batch.n_events()])?;
        }
    }
    Ok((batch, channels))
}

fn counts_mask(batch: &EventBatch, collection: &str, pred: impl Fn(usize) -> bool) -> Result<Mask> {
    let counts = batch.require_collection(collection)?.counts();
    Ok(Mask::from_bools(&counts.iter().map(|&c| pred(c)).collect::<Vec<_>>()))
}

/// Drive the dilepton step sequence and take the snapshots. Returns the
/// label of the step the cutflow table should end at.
pub fn event_select(
    cfg: &SelectionConfig,
    batch: &EventBatch,
    session: &mut CutflowSession,
) -> Result<&'static str> {
    session.add_step("METFilters", StepMask::Shared(met_filter_mask(batch, &cfg.era)?), INIT_STEP)?;

    let mut trigger_masks = BTreeMap::new();
    for chan in session.channels().to_vec() {
        trigger_masks.insert(chan.clone(), dilepton_hlt_mask(batch, &chan, cfg)?);
    }
    session.add_step("Triggers", StepMask::PerChannel(trigger_masks), "METFilters")?;

    session.add_step(
        "PrimaryVertex",
        StepMask::Shared(batch.mask_f64("PV_npvsGood", |n| n > 0.0)?),
        "Triggers",
    )?;

    session.add_step(
        "LeptonMultiplicity",
        StepMask::Shared(counts_mask(batch, "lepton", |n| n == 2)?),
        "PrimaryVertex",
    )?;

    let mass = batch.require_collection("llbar")?.require_field("mass")?.to_vec();
    session.add_step(
        "LeptonInvariantMass",
        StepMask::Shared(Mask::from_f64s(&mass, |m| m > 20.0)),
        "LeptonMultiplicity",
    )?;

    let z_window = Mask::from_f64s(&mass, |m| m < 76.0 || m > 106.0);
    let n = batch.n_events();
    session.add_step(
        "Zwindow",
        StepMask::PerChannel(BTreeMap::from([
            ("ee".to_string(), z_window.clone()),
            ("mumu".to_string(), z_window.clone()),
            ("emu".to_string(), Mask::trues(n)),
        ])),
        "LeptonInvariantMass",
    )?;
    session.add_step(
        "InvertZwindow",
        StepMask::PerChannel(BTreeMap::from([
            ("ee".to_string(), !&z_window),
            ("mumu".to_string(), !&z_window),
            ("emu".to_string(), Mask::falses(n)),
        ])),
        "LeptonInvariantMass",
    )?;

    let two_jets = counts_mask(batch, "Jet_selected", |n| n >= 2)?;
    session.add_step("JetMultiplicity", StepMask::Shared(two_jets.clone()), "Zwindow")?;
    session.add_step("JetMultiplicity_zWindow", StepMask::Shared(two_jets), "InvertZwindow")?;

    let met = batch.mask_f64("PuppiMET_pt", |met| met > 40.0)?;
    let met_masks = |met: &Mask| {
        BTreeMap::from([
            ("ee".to_string(), met.clone()),
            ("mumu".to_string(), met.clone()),
            ("emu".to_string(), Mask::trues(n)),
        ])
    };
    session.add_step("MET", StepMask::PerChannel(met_masks(&met)), "JetMultiplicity")?;
    session.add_step(
        "MET_zWindow",
        StepMask::PerChannel(met_masks(&met)),
        "JetMultiplicity_zWindow",
    )?;

    let one_bjet = counts_mask(batch, "bJetsAK4", |n| n >= 1)?;
    session.add_step("BJetMultiplicity", StepMask::Shared(one_bjet.clone()), "MET")?;
    session.add_step("BJetMultiplicity_zWindow", StepMask::Shared(one_bjet), "MET_zWindow")?;

    let snapshots = [
        ("METFilters", "step1a"),
        ("PrimaryVertex", "step1"),
        ("LeptonMultiplicity", "step2"),
        ("LeptonInvariantMass", "step3"),
        ("Zwindow", "step4"),
        ("InvertZwindow", "step4_zWindow"),
        ("JetMultiplicity", "step5"),
        ("JetMultiplicity_zWindow", "step5_zWindow"),
        ("MET", "step6"),
        ("MET_zWindow", "step6_zWindow"),
        ("BJetMultiplicity", "step7"),
        ("BJetMultiplicity_zWindow", "step7_zWindow"),
    ];
    for (label, name) in snapshots {
        session.snapshot(batch, label, name, &cfg.structure)?;
    }
    Ok("BJetMultiplicity")
}
