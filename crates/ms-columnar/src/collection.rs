//! Jagged object collections (electrons, muons, jets, ...).
//!
//! A collection is a set of equally-shaped jagged columns: one `offsets`
//! array (`n_events + 1` entries) shared by every field, with field values
//! stored flat across all events. This is the structure-of-arrays layout of
//! the batch store, one nesting level deeper.

use std::collections::HashMap;

use ms_core::{Error, Result};

use crate::Mask;

/// One jagged object collection over an event batch.
#[derive(Debug, Clone)]
pub struct Collection {
    offsets: Vec<usize>,
    field_names: Vec<String>,
    fields: Vec<Vec<f64>>,
    name_to_index: HashMap<String, usize>,
}

impl Collection {
    /// Create an empty collection (no fields yet) from event offsets.
    ///
    /// `offsets` must start at zero and be non-decreasing.
    pub fn new(offsets: Vec<usize>) -> Result<Self> {
        if offsets.is_empty() || offsets[0] != 0 {
            return Err(Error::Column("collection offsets must start at 0".into()));
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::Column("collection offsets must be non-decreasing".into()));
        }
        Ok(Self {
            offsets,
            field_names: Vec::new(),
            fields: Vec::new(),
            name_to_index: HashMap::new(),
        })
    }

    /// Create a collection from offsets and named flat fields.
    pub fn from_fields(
        offsets: Vec<usize>,
        fields: impl IntoIterator<Item = (String, Vec<f64>)>,
    ) -> Result<Self> {
        let mut coll = Self::new(offsets)?;
        for (name, values) in fields {
            coll.set_field(&name, values)?;
        }
        Ok(coll)
    }

    /// Number of events.
    pub fn n_events(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of objects across all events.
    pub fn n_objects(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Event offsets (`n_events + 1` entries).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Object multiplicity per event (`ak.num` equivalent).
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Object count for one event.
    pub fn count(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Whether a field exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Flat values of a field.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        let idx = self.name_to_index.get(name).copied()?;
        self.fields.get(idx).map(|f| f.as_slice())
    }

    /// Flat values of a field, as an error when absent.
    pub fn require_field(&self, name: &str) -> Result<&[f64]> {
        self.field(name)
            .ok_or_else(|| Error::Column(format!("collection has no field '{name}'")))
    }

    /// Add or replace a field. The flat length must match the offsets.
    pub fn set_field(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.n_objects() {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                expected: self.n_objects(),
                got: values.len(),
            });
        }
        match self.name_to_index.get(name) {
            Some(&idx) => self.fields[idx] = values,
            None => {
                self.name_to_index.insert(name.to_string(), self.fields.len());
                self.field_names.push(name.to_string());
                self.fields.push(values);
            }
        }
        Ok(())
    }

    /// Value of `field` for object `idx` of event `row`, if present.
    pub fn get(&self, row: usize, idx: usize, field: &str) -> Option<f64> {
        let values = self.field(field)?;
        let start = self.offsets[row];
        if idx >= self.count(row) {
            return None;
        }
        Some(values[start + idx])
    }

    /// Per-event value of the `idx`-th object of a field, padded with `fill`
    /// for events with fewer objects (`ak.pad_none` + `fill_none`).
    pub fn padded(&self, field: &str, idx: usize, fill: f64) -> Result<Vec<f64>> {
        let values = self.require_field(field)?;
        Ok(self
            .offsets
            .windows(2)
            .map(|w| if w[0] + idx < w[1] { values[w[0] + idx] } else { fill })
            .collect())
    }

    /// Flat per-object boolean mask from a predicate over one field.
    pub fn object_mask(&self, field: &str, pred: impl Fn(f64) -> bool) -> Result<Vec<bool>> {
        Ok(self.require_field(field)?.iter().map(|&v| pred(v)).collect())
    }

    /// Keep only the objects flagged in the flat `keep` mask; offsets are
    /// rebuilt, every field is filtered identically.
    pub fn retain_objects(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.n_objects() {
            return Err(Error::LengthMismatch {
                name: "object mask".into(),
                expected: self.n_objects(),
                got: keep.len(),
            });
        }
        let mut offsets = Vec::with_capacity(self.offsets.len());
        offsets.push(0);
        let mut kept = 0usize;
        for w in self.offsets.windows(2) {
            kept += keep[w[0]..w[1]].iter().filter(|&&k| k).count();
            offsets.push(kept);
        }
        let mut out = Self::new(offsets)?;
        for (name, values) in self.field_names.iter().zip(&self.fields) {
            let filtered: Vec<f64> =
                values.iter().zip(keep).filter(|(_, &k)| k).map(|(&v, _)| v).collect();
            out.set_field(name, filtered)?;
        }
        Ok(out)
    }

    /// Keep only the events flagged in the per-event mask.
    pub fn filter_events(&self, mask: &Mask) -> Result<Self> {
        if mask.len() != self.n_events() {
            return Err(Error::LengthMismatch {
                name: "event mask".into(),
                expected: self.n_events(),
                got: mask.len(),
            });
        }
        let mut offsets = Vec::with_capacity(mask.count() + 1);
        offsets.push(0);
        let mut total = 0usize;
        for (row, w) in self.offsets.windows(2).enumerate() {
            if mask.get(row) {
                total += w[1] - w[0];
                offsets.push(total);
            }
        }
        let mut out = Self::new(offsets)?;
        for (name, values) in self.field_names.iter().zip(&self.fields) {
            let mut filtered = Vec::with_capacity(total);
            for (row, w) in self.offsets.windows(2).enumerate() {
                if mask.get(row) {
                    filtered.extend_from_slice(&values[w[0]..w[1]]);
                }
            }
            out.set_field(name, filtered)?;
        }
        Ok(out)
    }

    /// Reorder objects within each event by descending value of `field`.
    pub fn sort_desc_by(&self, field: &str) -> Result<Self> {
        let key = self.require_field(field)?.to_vec();
        let mut order: Vec<usize> = Vec::with_capacity(self.n_objects());
        for w in self.offsets.windows(2) {
            let mut idx: Vec<usize> = (w[0]..w[1]).collect();
            idx.sort_by(|&a, &b| key[b].partial_cmp(&key[a]).unwrap_or(std::cmp::Ordering::Equal));
            order.extend(idx);
        }
        let mut out = Self::new(self.offsets.clone())?;
        for (name, values) in self.field_names.iter().zip(&self.fields) {
            out.set_field(name, order.iter().map(|&i| values[i]).collect())?;
        }
        Ok(out)
    }

    /// Per-event concatenation of two collections on the given fields.
    ///
    /// A field missing from either side is filled with ones for that side
    /// (the convention used when merging lepton flavors whose per-flavor
    /// weight fields do not overlap).
    pub fn concat_on(&self, other: &Collection, fields: &[String]) -> Result<Self> {
        if self.n_events() != other.n_events() {
            return Err(Error::LengthMismatch {
                name: "concat".into(),
                expected: self.n_events(),
                got: other.n_events(),
            });
        }
        let mut offsets = Vec::with_capacity(self.offsets.len());
        offsets.push(0);
        let mut total = 0usize;
        for row in 0..self.n_events() {
            total += self.count(row) + other.count(row);
            offsets.push(total);
        }
        let mut out = Self::new(offsets)?;
        for name in fields {
            let mut values = Vec::with_capacity(total);
            for row in 0..self.n_events() {
                for side in [self, other] {
                    let (start, end) = (side.offsets[row], side.offsets[row + 1]);
                    match side.field(name) {
                        Some(v) => values.extend_from_slice(&v[start..end]),
                        None => values.extend(std::iter::repeat(1.0).take(end - start)),
                    }
                }
            }
            out.set_field(name, values)?;
        }
        Ok(out)
    }

    /// Flat per-object index within its event (`ak.local_index`).
    pub fn local_index(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_objects());
        for w in self.offsets.windows(2) {
            out.extend((0..w[1] - w[0]).map(|i| i as f64));
        }
        out
    }

    /// Per-event product of a field (unit for empty events).
    pub fn product_per_event(&self, field: &str) -> Result<Vec<f64>> {
        let values = self.require_field(field)?;
        Ok(self.offsets.windows(2).map(|w| values[w[0]..w[1]].iter().product()).collect())
    }
}
