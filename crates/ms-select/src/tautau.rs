//! Tau-lepton selection: looser light-lepton cuts, tau working points, and
//! the short step sequence without triggers or b-tagging.

use std::collections::BTreeMap;

use ms_columnar::{make_weight_fields, Collection, EventBatch, Mask};
use ms_core::{Result, SelectionConfig};
use ms_corrections::{
    electron_corr, electron_sf, jet_id, jet_jerc, muon_corr, muon_sf, pileup_weights, tau_sf_corr,
    veto_map, CorrectionsConfig, SfDependency, TauWorkingPoints,
};
use ms_cutflow::{CutflowSession, StepMask, INIT_STEP};

use crate::objects::{dilepton_pairing, four_vector_sum, lepton_merging, met_filter_mask};

/// Minitree key prefix for tau-lepton snapshots.
pub const STEP_TAG: &str = "tree_variables_";

fn select_electrons(batch: &EventBatch, corr: &CorrectionsConfig) -> Result<Collection> {
    let mut electrons = batch.require_collection("Electron")?.clone();
    electron_corr(&mut electrons, corr)?;
    let keep = electrons.object_mask("corr_pt", |pt| pt >= 10.0)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("eta", |eta| eta.abs() <= 2.5)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("eta", |eta| eta.abs() > 1.566 || eta.abs() < 1.4442)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("cutBased", |id| id >= 4.0)?;
    let mut electrons = electrons.retain_objects(&keep)?;
    electron_sf(&mut electrons, "Tight", corr)?;
    let keep = electrons.object_mask("dxy", |d| d.abs() <= 0.045)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("dz", |d| d.abs() <= 0.02)?;
    let electrons = electrons.retain_objects(&keep)?;
    let keep = electrons.object_mask("miniPFRelIso_all", |iso| iso <= 0.5)?;
    electrons.retain_objects(&keep)
}

fn select_muons(batch: &EventBatch, corr: &CorrectionsConfig) -> Result<Collection> {
    let mut muons = batch.require_collection("Muon")?.clone();
    muon_corr(&mut muons, corr)?;
    let keep = muons.object_mask("corr_pt", |pt| pt >= 10.0)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("eta", |eta| eta.abs() <= 2.4)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("pfRelIso04_all", |iso| iso <= 0.5)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("tightId", |id| id != 0.0)?;
    let mut muons = muons.retain_objects(&keep)?;
    muon_sf(&mut muons, "id", corr)?;
    let keep = muons.object_mask("dxy", |d| d.abs() <= 0.045)?;
    let muons = muons.retain_objects(&keep)?;
    let keep = muons.object_mask("dz", |d| d.abs() <= 0.02)?;
    muons.retain_objects(&keep)
}

fn select_taus(batch: &EventBatch, corr: &CorrectionsConfig) -> Result<Collection> {
    let wps = TauWorkingPoints {
        vs_e: "Tight".into(),
        vs_mu: "Tight".into(),
        vs_jet: "Tight".into(),
    };
    let taus =
        tau_sf_corr(batch.require_collection("Tau")?, &wps, corr, SfDependency::Pt)?;
    let keep = taus.object_mask("pt", |pt| pt >= 25.0)?;
    let taus = taus.retain_objects(&keep)?;
    let keep = taus.object_mask("eta", |eta| eta.abs() <= 2.5)?;
    let taus = taus.retain_objects(&keep)?;
    let keep = taus.object_mask("idDeepTau2018v2p5VSe", |id| id >= 6.0)?;
    let taus = taus.retain_objects(&keep)?;
    let keep = taus.object_mask("idDeepTau2018v2p5VSmu", |id| id >= 4.0)?;
    let taus = taus.retain_objects(&keep)?;
    let keep = taus.object_mask("idDeepTau2018v2p5VSjet", |id| id >= 6.0)?;
    let taus = taus.retain_objects(&keep)?;
    let keep = taus.object_mask("dz", |d| d.abs() <= 0.02)?;
    taus.retain_objects(&keep)
}

/// Remove jets matched by index to either lepton candidate, then apply ID,
/// energy correction, kinematic cuts, and the veto map.
fn select_jets(
    batch: &EventBatch,
    lep: &Collection,
    lbar: &Collection,
    corr: &CorrectionsConfig,
) -> Result<Collection> {
    let jets = batch.require_collection("Jet")?;
    let local = jets.local_index();
    let lep_idx = lep.require_field("jetIdx")?;
    let lbar_idx = lbar.require_field("jetIdx")?;
    let mut keep = Vec::with_capacity(jets.n_objects());
    for (row, w) in jets.offsets().windows(2).enumerate() {
        for i in w[0]..w[1] {
            keep.push(local[i] != lep_idx[row] && local[i] != lbar_idx[row]);
        }
    }
    let jets = jets.retain_objects(&keep)?;
    let mut jets = jet_id(&jets, "TightLeptonVeto", corr)?;
    jet_jerc(&mut jets, corr)?;
    let keep = jets.object_mask("corr_pt", |pt| pt > 30.0)?;
    let jets = jets.retain_objects(&keep)?;
    let keep = jets.object_mask("eta", |eta| eta.abs() < 2.5)?;
    let jets = jets.retain_objects(&keep)?;
    let keep = veto_map(&jets, "jetvetomap", corr)?;
    jets.retain_objects(&keep)
}

fn channel_masks(lep: &Collection, lbar: &Collection) -> Result<BTreeMap<String, Mask>> {
    let pdg_lep = lep.require_field("pdgId")?;
    let pdg_lbar = lbar.require_field("pdgId")?;
    let pair = |a: f64, b: f64| -> Vec<bool> {
        pdg_lep.iter().zip(pdg_lbar).map(|(&l, &r)| l == a && r == b).collect()
    };
    let either = |x: Vec<bool>, y: Vec<bool>| -> Vec<bool> {
        x.iter().zip(&y).map(|(&a, &b)| a || b).collect()
    };
    let etau = either(pair(11.0, -15.0), pair(15.0, -11.0));
    let mutau = either(pair(13.0, -15.0), pair(15.0, -13.0));
    let tautau = pair(15.0, -15.0);
    Ok(BTreeMap::from([
        ("etau".to_string(), Mask::from_bools(&etau)),
        ("mutau".to_string(), Mask::from_bools(&mutau)),
        ("tautau".to_string(), Mask::from_bools(&tautau)),
    ]))
}

/// Corrections, object selection with taus merged into the lepton
/// collection, candidate building, and channel definition.
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
    let taus = select_taus(&batch, corr)?;
    batch.set_collection("Tau", taus)?;

    let leptons = lepton_merging(&batch, true)?;
    let (lep, lbar) = dilepton_pairing(&leptons)?;
    let llbar = four_vector_sum(&lep, &lbar)?;
    let channels = channel_masks(&lep, &lbar)?;

    let jets = select_jets(&batch, &lep, &lbar, corr)?;
    batch.set_collection("lepton", leptons)?;
    batch.set_collection("lep", lep)?;
    batch.set_collection("lbar", lbar)?;
    batch.set_collection("llbar", llbar)?;
    batch.set_collection("Jet_selected", jets)?;

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

/// Drive the tau-lepton step sequence and take the snapshots. Returns the
/// label of the step the cutflow table should end at.
pub fn event_select(
    cfg: &SelectionConfig,
    batch: &EventBatch,
    session: &mut CutflowSession,
) -> Result<&'static str> {
    session.add_step("METFilters", StepMask::Shared(met_filter_mask(batch, &cfg.era)?), INIT_STEP)?;
    session.add_step(
        "PrimaryVertex",
        StepMask::Shared(batch.mask_f64("PV_npvsGood", |n| n > 0.0)?),
        "METFilters",
    )?;
    let mass = batch.require_collection("llbar")?.require_field("mass")?.to_vec();
    session.add_step(
        "LeptonInvariantMass",
        StepMask::Shared(Mask::from_f64s(&mass, |m| m > 20.0)),
        "PrimaryVertex",
    )?;
    let counts = batch.require_collection("Jet_selected")?.counts();
    session.add_step(
        "JetMultiplicity",
        StepMask::Shared(Mask::from_bools(&counts.iter().map(|&n| n >= 2).collect::<Vec<_>>())),
        "LeptonInvariantMass",
    )?;

    let snapshots = [
        ("METFilters", "stepMET"),
        ("PrimaryVertex", "stepPV"),
        ("LeptonInvariantMass", "stepLepInvMass"),
        ("JetMultiplicity", "stepJetMult"),
    ];
    for (label, name) in snapshots {
        session.snapshot(batch, label, name, &cfg.structure)?;
    }
    Ok("JetMultiplicity")
}
