//! Trigger resolution: group masks from fired-path indices and the
//! channel/dataset combination table.

use std::collections::HashMap;

use ms_columnar::{EventBatch, Mask};
use ms_core::{Error, Result, SelectionConfig};

/// Name-to-index map over the run's HLT path list; the first occurrence of a
/// duplicated name wins.
fn hlt_index_map(paths: &[String]) -> HashMap<&str, usize> {
    let mut map = HashMap::new();
    for (idx, name) in paths.iter().enumerate() {
        map.entry(name.as_str()).or_insert(idx);
    }
    map
}

/// Per-event OR of the group's resolvable paths against the jagged
/// fired-path index column. Unknown paths warn; a group with no resolvable
/// path yields an all-false mask with a warning.
fn group_mask(
    batch: &EventBatch,
    group: &str,
    paths: &[String],
    index_map: &HashMap<&str, usize>,
) -> Result<Mask> {
    let mut indices = Vec::new();
    for path in paths {
        match index_map.get(path.as_str()) {
            Some(&idx) => indices.push(idx as f64),
            None => tracing::warn!("HLT path '{path}' not found in run's path list"),
        }
    }
    if indices.is_empty() {
        tracing::warn!("no resolvable HLT paths for group '{group}', using all-false mask");
        return Ok(Mask::falses(batch.n_events()));
    }
    let fired = batch.require_collection("HLTidx")?;
    let values = fired.require_field("value")?;
    let fired_any: Vec<bool> = fired
        .offsets()
        .windows(2)
        .map(|w| values[w[0]..w[1]].iter().any(|v| indices.contains(v)))
        .collect();
    Ok(Mask::from_bools(&fired_any))
}

/// Resolve the trigger mask for one dilepton channel.
///
/// Simulation takes the union of the channel's double- and single-lepton
/// groups. Data applies the dataset-specific anti-overlap table; a dataset
/// the table does not cover degrades to an all-false mask with a warning.
/// An unknown channel is a programmer error and fails hard.
pub fn dilepton_hlt_mask(batch: &EventBatch, channel: &str, cfg: &SelectionConfig) -> Result<Mask> {
    let index_map = hlt_index_map(&cfg.hlt_paths);
    tracing::debug!("HLT index map holds {} paths", index_map.len());

    let dataset = cfg.dataset();
    let mut masks: HashMap<&str, Mask> = HashMap::new();
    for (name, group) in &cfg.hlt {
        if cfg.is_data && !group.datasets.iter().any(|d| d == &dataset) {
            tracing::info!("dataset '{dataset}' not covered by trigger group '{name}'");
            masks.insert(name, Mask::falses(batch.n_events()));
            continue;
        }
        masks.insert(name, group_mask(batch, name, &group.triggers, &index_map)?);
    }
    let m = |name: &str| masks.get(name).cloned().unwrap_or_else(|| Mask::falses(batch.n_events()));

    if !cfg.is_data {
        return match channel {
            "ee" => Ok(&m("ee") | &m("se")),
            "mumu" => Ok(&m("mumu") | &m("smu")),
            "emu" => Ok(&(&m("emu") | &m("se")) | &m("smu")),
            other => Err(Error::UnknownChannel(other.to_string())),
        };
    }

    let degraded = || {
        tracing::warn!(
            "dataset '{dataset}' not supported for channel '{channel}', using all-false mask"
        );
        Mask::falses(batch.n_events())
    };
    match channel {
        "ee" => Ok(match dataset.as_str() {
            "EGamma" => &m("ee") | &m("se"),
            _ => degraded(),
        }),
        "emu" => Ok(match dataset.as_str() {
            "MuonEG" => m("emu"),
            "EGamma" => &m("se") & &!&m("emu"),
            "SingleMuon" | "Muon" => &(&m("smu") & &!&m("emu")) & &!&m("se"),
            _ => degraded(),
        }),
        "mumu" => Ok(match dataset.as_str() {
            "Muon" => &m("mumu") | &m("smu"),
            "SingleMuon" => &!&m("mumu") & &m("smu"),
            "DoubleMuon" => m("mumu"),
            _ => degraded(),
        }),
        other => Err(Error::UnknownChannel(other.to_string())),
    }
}
