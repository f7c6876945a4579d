//! # ms-select
//!
//! Selection strategies for the minisel pipeline: object selection, trigger
//! and dataset resolution, and the per-strategy cutflow step sequences. The
//! strategy set is closed; adding one means adding an enum variant and its
//! registration entry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dilepton;
pub mod objects;
pub mod tautau;
pub mod trigger;

use std::collections::BTreeMap;

use ms_columnar::EventBatch;
use ms_core::{Error, Result, SelectionConfig};
use ms_corrections::{apply_golden_json, detector_defects_mask, CorrectionsConfig};
use ms_cutflow::{CutflowSession, CutflowTable, Minitree};

/// The available selection strategies, keyed by channel-set name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// ee / mumu / emu ttbar selection with triggers and b-tagging.
    Dilepton,
    /// etau / mutau / tautau selection.
    TauTau,
}

/// Registration table: channel-set name to strategy.
const SELECTORS: &[(&str, SelectorKind)] =
    &[("dilepton", SelectorKind::Dilepton), ("tautau", SelectorKind::TauTau)];

impl SelectorKind {
    /// Look up a strategy by its channel-set name.
    pub fn from_channel_set(name: &str) -> Result<Self> {
        SELECTORS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, kind)| kind)
            .ok_or_else(|| Error::Config(format!("unknown channel set '{name}'")))
    }

    /// Registered channel-set names.
    pub fn names() -> Vec<&'static str> {
        SELECTORS.iter().map(|&(n, _)| n).collect()
    }

    /// Minitree key prefix used by this strategy.
    pub fn step_tag(&self) -> &'static str {
        match self {
            SelectorKind::Dilepton => dilepton::STEP_TAG,
            SelectorKind::TauTau => tautau::STEP_TAG,
        }
    }
}

/// Everything one selection pass produces for one batch.
#[derive(Debug)]
pub struct SelectionOutput {
    /// Per-channel, per-step snapshots.
    pub minitree: Minitree,
    /// Per-channel weighted cutflow.
    pub cutflow: CutflowTable,
    /// Channel names of the strategy.
    pub channels: Vec<String>,
}

/// Run one full selection pass: certified-lumi filtering (data),
/// detector-defect masking, object pre-selection, the event-level step
/// sequence with snapshots, and the cutflow table.
pub fn run_selection(
    kind: SelectorKind,
    cfg: &SelectionConfig,
    corr: &CorrectionsConfig,
    batch: EventBatch,
) -> Result<SelectionOutput> {
    let batch =
        if cfg.is_data { apply_golden_json(&batch, corr, &cfg.data_dir)? } else { batch };
    let batch = detector_defects_mask(batch, &cfg.era, corr)?;

    let (batch, channels) = match kind {
        SelectorKind::Dilepton => dilepton::pre_select(cfg, corr, batch)?,
        SelectorKind::TauTau => tautau::pre_select(cfg, corr, batch)?,
    };
    let mut session = CutflowSession::new(&channels, kind.step_tag())?;
    if cfg.is_signal {
        session.snapshot_step0(&batch, &BTreeMap::new(), &cfg.structure)?;
    }
    let last_step = match kind {
        SelectorKind::Dilepton => dilepton::event_select(cfg, &batch, &mut session)?,
        SelectorKind::TauTau => tautau::event_select(cfg, &batch, &mut session)?,
    };
    let cutflow = session.cutflow(&batch, last_step, "eventWeight")?;
    let channels = session.channels().to_vec();
    Ok(SelectionOutput { minitree: session.into_minitree(), cutflow, channels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_set_registration() {
        assert_eq!(SelectorKind::from_channel_set("dilepton").unwrap(), SelectorKind::Dilepton);
        assert_eq!(SelectorKind::from_channel_set("tautau").unwrap(), SelectorKind::TauTau);
        assert!(SelectorKind::from_channel_set("singlelepton").is_err());
        assert_eq!(SelectorKind::names(), vec!["dilepton", "tautau"]);
    }

    #[test]
    fn step_tags_differ_per_strategy() {
        assert_eq!(SelectorKind::Dilepton.step_tag(), "ttBar_treeVariables_");
        assert_eq!(SelectorKind::TauTau.step_tag(), "tree_variables_");
    }
}
