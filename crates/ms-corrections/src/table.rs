//! Binned lookup tables for calibration data.

use serde::{Deserialize, Serialize};

use ms_core::{Error, Result};

/// One-dimensional binned table with clamped lookup.
///
/// `edges` has `values.len() + 1` entries, strictly increasing. A query below
/// the first edge lands in the first bin, above the last edge in the last bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinnedTable {
    /// Bin edges, strictly increasing.
    pub edges: Vec<f64>,
    /// One value per bin.
    pub values: Vec<f64>,
}

impl BinnedTable {
    /// Check the edge/value shape. Called from config validation.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.edges.len() < 2 {
            return Err(Error::Config(format!("table '{name}': missing bin edges")));
        }
        if self.edges.len() != self.values.len() + 1 {
            return Err(Error::Config(format!(
                "table '{name}': {} edges for {} bins",
                self.edges.len(),
                self.values.len()
            )));
        }
        if self.edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Config(format!("table '{name}': edges not increasing")));
        }
        Ok(())
    }

    /// Bin index for a query, clamped to the table range.
    fn bin(&self, x: f64) -> usize {
        match self.edges.iter().rposition(|&e| e <= x) {
            Some(i) => i.min(self.values.len() - 1),
            None => 0,
        }
    }

    /// Table value at `x`.
    pub fn lookup(&self, x: f64) -> f64 {
        self.values[self.bin(x)]
    }
}

/// Two-dimensional binned table (e.g. scale factors over pt and |eta|).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinnedTable2 {
    /// Bin edges along the first axis.
    pub x_edges: Vec<f64>,
    /// Bin edges along the second axis.
    pub y_edges: Vec<f64>,
    /// Row-major values, `(x_edges.len() - 1) * (y_edges.len() - 1)` entries.
    pub values: Vec<f64>,
}

impl BinnedTable2 {
    /// Check the edge/value shape.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.x_edges.len() < 2 || self.y_edges.len() < 2 {
            return Err(Error::Config(format!("table '{name}': missing axis edges")));
        }
        let expected = (self.x_edges.len() - 1) * (self.y_edges.len() - 1);
        if self.values.len() != expected {
            return Err(Error::Config(format!(
                "table '{name}': {} values for {expected} bins",
                self.values.len()
            )));
        }
        if self.x_edges.windows(2).any(|w| w[1] <= w[0])
            || self.y_edges.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(Error::Config(format!("table '{name}': edges not increasing")));
        }
        Ok(())
    }

    fn axis_bin(edges: &[f64], x: f64) -> usize {
        match edges.iter().rposition(|&e| e <= x) {
            Some(i) => i.min(edges.len() - 2),
            None => 0,
        }
    }

    /// Table value at `(x, y)`, clamped to the table range on both axes.
    pub fn lookup(&self, x: f64, y: f64) -> f64 {
        let ix = Self::axis_bin(&self.x_edges, x);
        let iy = Self::axis_bin(&self.y_edges, y);
        self.values[ix * (self.y_edges.len() - 1) + iy]
    }
}
