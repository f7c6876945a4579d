//! Luminosity corrections: pileup weights and the certified-lumi mask.

use std::collections::BTreeMap;
use std::path::Path;

use ms_columnar::{EventBatch, Mask};
use ms_core::{Error, Result};

use crate::config::CorrectionsConfig;

/// Add the `pileupWeight` scalar: a table lookup of the true number of
/// interactions for simulation, unit for data.
pub fn pileup_weights(batch: &mut EventBatch, cfg: &CorrectionsConfig, is_data: bool) -> Result<()> {
    if is_data {
        batch.set_f64s("pileupWeight", vec![1.0; batch.n_events()])?;
        return Ok(());
    }
    let table = cfg
        .pileup
        .as_ref()
        .ok_or_else(|| Error::Config(format!("no pileup table for era '{}'", cfg.era)))?;
    let n_true = batch.f64s("Pileup_nTrueInt")?;
    let weights = n_true.iter().map(|&n| table.lookup(n)).collect();
    batch.set_f64s("pileupWeight", weights)?;
    Ok(())
}

/// Certified luminosity sections: run number to accepted lumi-block ranges
/// (inclusive on both ends, as in the golden JSON files).
#[derive(Debug, Clone)]
pub struct LumiMask {
    ranges: BTreeMap<u64, Vec<(u64, u64)>>,
}

impl LumiMask {
    /// Parse a golden JSON file: `{"356381": [[1, 126], [129, 130]], ...}`.
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Vec<(u64, u64)>> = serde_json::from_str(&text)?;
        let mut ranges = BTreeMap::new();
        for (run, blocks) in raw {
            let run: u64 = run
                .parse()
                .map_err(|_| Error::Config(format!("golden JSON: bad run number '{run}'")))?;
            ranges.insert(run, blocks);
        }
        Ok(Self { ranges })
    }

    /// Whether a (run, lumi-block) pair is certified.
    pub fn contains(&self, run: u64, lumi: u64) -> bool {
        self.ranges
            .get(&run)
            .is_some_and(|blocks| blocks.iter().any(|&(lo, hi)| lumi >= lo && lumi <= hi))
    }

    /// Per-event mask from the batch's `run` and `luminosityBlock` columns.
    pub fn mask(&self, batch: &EventBatch) -> Result<Mask> {
        let runs = batch.f64s("run")?;
        let lumis = batch.f64s("luminosityBlock")?;
        Ok(Mask::from_bools(
            &runs
                .iter()
                .zip(lumis)
                .map(|(&r, &l)| self.contains(r as u64, l as u64))
                .collect::<Vec<_>>(),
        ))
    }
}

/// Filter a data batch through the era's golden JSON. An era whose
/// calibration file names no golden JSON cannot be processed as data.
pub fn apply_golden_json(
    batch: &EventBatch,
    cfg: &CorrectionsConfig,
    data_dir: &Path,
) -> Result<EventBatch> {
    let rel = cfg
        .golden_json
        .as_ref()
        .ok_or_else(|| Error::UnsupportedEra(cfg.era.clone()))?;
    let mask = LumiMask::from_json(&data_dir.join(rel))?.mask(batch)?;
    tracing::info!(
        "golden JSON for era '{}': {} / {} events certified",
        cfg.era,
        mask.count(),
        mask.len()
    );
    batch.filter(&mask)
}
