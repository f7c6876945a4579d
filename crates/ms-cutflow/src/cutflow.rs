//! Cutflow tables: per-channel weighted survivor counts after each cut.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One cutflow row: the weighted event count (and its squared-weight sum,
/// for statistical uncertainty) after one cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutflowRow {
    /// Registry key of the cut, or `"Initial"` for the pre-selection row.
    pub label: String,
    /// Sum of event weights surviving up to and including this cut.
    pub sum_weights: f64,
    /// Sum of squared event weights surviving up to and including this cut.
    pub sum_weights_sq: f64,
}

impl CutflowRow {
    /// Statistical uncertainty on `sum_weights`.
    pub fn uncertainty(&self) -> f64 {
        self.sum_weights_sq.sqrt()
    }
}

/// Cutflow rows keyed by channel, in cut order per channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutflowTable {
    /// Per-channel rows, first row `"Initial"`.
    pub channels: BTreeMap<String, Vec<CutflowRow>>,
}

impl CutflowTable {
    /// Rows for one channel, if present.
    pub fn rows(&self, channel: &str) -> Option<&[CutflowRow]> {
        self.channels.get(channel).map(|v| v.as_slice())
    }

    /// Selection efficiency for one channel: last row over `"Initial"`.
    /// `None` when the channel is absent or has no events.
    pub fn efficiency(&self, channel: &str) -> Option<f64> {
        let rows = self.channels.get(channel)?;
        let first = rows.first()?;
        let last = rows.last()?;
        if first.sum_weights == 0.0 {
            return None;
        }
        Some(last.sum_weights / first.sum_weights)
    }
}

impl fmt::Display for CutflowTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (channel, rows) in &self.channels {
            writeln!(f, "channel {channel}")?;
            let width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
            for row in rows {
                writeln!(
                    f,
                    "  {:width$}  {:>14.4}  +- {:>12.4}",
                    row.label,
                    row.sum_weights,
                    row.uncertainty(),
                )?;
            }
        }
        Ok(())
    }
}
