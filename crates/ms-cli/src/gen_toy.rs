//! `minisel gen-toy`: synthetic NanoAOD-style events for shaking down the
//! pipeline without real ntuples. The physics content is nonsense; the shapes
//! and column names match what the selection strategies read.

use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ms_columnar::{write_event_batch, Collection, EventBatch};

const HLT_PATHS: usize = 5;

const MET_FLAGS: &[&str] = &[
    "goodVertices",
    "globalSuperTightHalo2016Filter",
    "EcalDeadCellTriggerPrimitiveFilter",
    "BadPFMuonFilter",
    "BadPFMuonDzFilter",
    "hfNoisyHitsFilter",
    "eeBadScFilter",
    "ecalBadCalibFilter",
];

/// Per-collection jagged accumulator with a fixed field order.
struct ObjBuilder {
    offsets: Vec<usize>,
    fields: Vec<(&'static str, Vec<f64>)>,
}

impl ObjBuilder {
    fn new(names: &[&'static str]) -> Self {
        Self { offsets: vec![0], fields: names.iter().map(|&n| (n, Vec::new())).collect() }
    }

    fn push(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.fields.len());
        for ((_, col), &v) in self.fields.iter_mut().zip(values) {
            col.push(v);
        }
    }

    fn next_event(&mut self) {
        self.offsets.push(self.fields.first().map_or(0, |(_, col)| col.len()));
    }

    fn finish(self) -> ms_core::Result<Collection> {
        Collection::from_fields(self.offsets, self.fields.into_iter().map(|(n, v)| (n.to_string(), v)))
    }
}

fn charge(rng: &mut StdRng) -> f64 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

fn toy_batch(events: usize, seed: u64) -> Result<EventBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pi = std::f64::consts::PI;

    let mut electrons = ObjBuilder::new(&[
        "pt",
        "eta",
        "phi",
        "mass",
        "charge",
        "pdgId",
        "cutBased",
        "dxy",
        "dz",
        "miniPFRelIso_all",
        "seediPhiOriY",
        "seediEtaOriX",
        "jetIdx",
    ]);
    let mut muons = ObjBuilder::new(&[
        "pt",
        "eta",
        "phi",
        "mass",
        "charge",
        "pdgId",
        "pfRelIso04_all",
        "tightId",
        "dxy",
        "dz",
        "jetIdx",
    ]);
    let mut taus = ObjBuilder::new(&[
        "pt",
        "eta",
        "phi",
        "mass",
        "charge",
        "decayMode",
        "idDeepTau2018v2p5VSe",
        "idDeepTau2018v2p5VSmu",
        "idDeepTau2018v2p5VSjet",
        "dz",
        "jetIdx",
    ]);
    let mut jets = ObjBuilder::new(&[
        "pt",
        "eta",
        "phi",
        "mass",
        "jetId",
        "btagRobustParTAK4B",
        "btagUParTAK4B",
    ]);
    let mut hlt = ObjBuilder::new(&["value"]);

    let mut met = Vec::with_capacity(events);
    let mut npvs = Vec::with_capacity(events);
    let mut pileup = Vec::with_capacity(events);

    for _ in 0..events {
        for _ in 0..rng.gen_range(0..=2) {
            let q = charge(&mut rng);
            electrons.push(&[
                rng.gen_range(15.0..80.0),
                rng.gen_range(-2.5..2.5),
                rng.gen_range(-pi..pi),
                0.000511,
                q,
                -11.0 * q,
                rng.gen_range(0..=4) as f64,
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
                rng.gen_range(0.0..0.6),
                rng.gen_range(0.0_f64..180.0).floor(),
                rng.gen_range(0.0_f64..100.0).floor(),
                -1.0,
            ]);
        }
        for _ in 0..rng.gen_range(0..=2) {
            let q = charge(&mut rng);
            muons.push(&[
                rng.gen_range(15.0..80.0),
                rng.gen_range(-2.4..2.4),
                rng.gen_range(-pi..pi),
                0.10566,
                q,
                -13.0 * q,
                rng.gen_range(0.0..0.4),
                if rng.gen_bool(0.9) { 1.0 } else { 0.0 },
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
                -1.0,
            ]);
        }
        for _ in 0..rng.gen_range(0..=1) {
            let q = charge(&mut rng);
            let dm = [0.0, 1.0, 5.0, 10.0, 11.0][rng.gen_range(0..5)];
            taus.push(&[
                rng.gen_range(20.0..70.0),
                rng.gen_range(-2.5..2.5),
                rng.gen_range(-pi..pi),
                1.777,
                q,
                dm,
                rng.gen_range(0..=7) as f64,
                rng.gen_range(0..=7) as f64,
                rng.gen_range(0..=7) as f64,
                rng.gen_range(-0.1..0.1),
                -1.0,
            ]);
        }
        for _ in 0..rng.gen_range(0..=4) {
            jets.push(&[
                rng.gen_range(20.0..120.0),
                rng.gen_range(-2.5..2.5),
                rng.gen_range(-pi..pi),
                rng.gen_range(5.0..15.0),
                6.0,
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            ]);
        }
        for idx in 0..HLT_PATHS {
            if rng.gen_bool(0.3) {
                hlt.push(&[idx as f64]);
            }
        }

        electrons.next_event();
        muons.next_event();
        taus.next_event();
        jets.next_event();
        hlt.next_event();

        met.push(rng.gen_range(0.0..120.0));
        npvs.push(rng.gen_range(1..40) as f64);
        pileup.push(rng.gen_range(10.0_f64..60.0).floor());
    }

    let mut batch = EventBatch::new(events);
    batch.set_f64s("event", (1..=events).map(|i| i as f64).collect())?;
    batch.set_f64s("run", vec![1.0; events])?;
    batch.set_f64s("luminosityBlock", (0..events).map(|i| (i / 100 + 1) as f64).collect())?;
    batch.set_f64s("PuppiMET_pt", met)?;
    batch.set_f64s("PV_npvsGood", npvs)?;
    batch.set_f64s("Pileup_nTrueInt", pileup)?;
    batch.set_f64s("genWeight", vec![1.0; events])?;
    for flag in MET_FLAGS {
        let bits: Vec<bool> = (0..events).map(|_| rng.gen_bool(0.98)).collect();
        batch.set_bools(&format!("Flag_{flag}"), bits)?;
    }
    batch.set_collection("Electron", electrons.finish()?)?;
    batch.set_collection("Muon", muons.finish()?)?;
    batch.set_collection("Tau", taus.finish()?)?;
    batch.set_collection("Jet", jets.finish()?)?;
    batch.set_collection("HLTidx", hlt.finish()?)?;
    Ok(batch)
}

pub fn cmd_gen_toy(output: &Path, events: usize, seed: u64) -> Result<()> {
    let batch = toy_batch(events, seed)?;
    write_event_batch(&batch, output)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!("wrote {events} synthetic events to '{}'", output.display());
    println!("wrote {events} events to {}", output.display());
    Ok(())
}
