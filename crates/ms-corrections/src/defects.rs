//! Era-dependent detector-defect masking.

use ms_columnar::{EventBatch, Mask};
use ms_core::Result;

use crate::config::CorrectionsConfig;
use crate::jme::veto_map;

/// Remove objects and events affected by known detector defects.
///
/// 2022postEE: electrons in the ECAL endcap water-leak region
/// (`seediPhiOriY > 72`, `seediEtaOriX < 45`, `eta > 1.556`) are dropped,
/// and events with any jet inside the `jetvetomap_eep` regions are vetoed.
/// Other eras pass through unchanged.
pub fn detector_defects_mask(
    batch: EventBatch,
    era: &str,
    cfg: &CorrectionsConfig,
) -> Result<EventBatch> {
    if era != "2022postEE" {
        return Ok(batch);
    }
    let mut batch = batch;

    let electrons = batch.require_collection("Electron")?;
    let phi_y = electrons.require_field("seediPhiOriY")?;
    let eta_x = electrons.require_field("seediEtaOriX")?;
    let eta = electrons.require_field("eta")?;
    let keep: Vec<bool> = (0..electrons.n_objects())
        .map(|i| !(phi_y[i] > 72.0 && eta_x[i] < 45.0 && eta[i] > 1.556))
        .collect();
    let cleaned = electrons.retain_objects(&keep)?;
    batch.set_collection("Electron", cleaned)?;

    let jets = batch.require_collection("Jet")?;
    let pass = veto_map(jets, "jetvetomap_eep", cfg)?;
    let mut event_ok = vec![true; batch.n_events()];
    for (row, w) in jets.offsets().windows(2).enumerate() {
        event_ok[row] = pass[w[0]..w[1]].iter().all(|&p| p);
    }
    let mask = Mask::from_bools(&event_ok);
    tracing::debug!(
        "EE-leak veto for era '{era}': {} / {} events kept",
        mask.count(),
        mask.len()
    );
    batch.filter(&mask)
}
