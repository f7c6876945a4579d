//! The event batch: scalar columns plus jagged object collections.

use std::collections::BTreeMap;
use std::collections::HashMap;

use ms_core::{Error, Result};

use crate::{Collection, Mask};

/// One per-event scalar column.
#[derive(Debug, Clone)]
pub enum Column {
    /// Numeric column (all numeric types are widened to `f64`).
    F64(Vec<f64>),
    /// Boolean column (event flags).
    Bool(Vec<bool>),
}

impl Column {
    /// Number of events.
    pub fn len(&self) -> usize {
        match self {
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    /// True when the column has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Columnar event batch (structure-of-arrays).
///
/// Scalar columns are per-event values (`event`, `PuppiMET.pt`, weights,
/// flags); collections are jagged object tables sharing one offsets array per
/// collection. Assigning to an existing name replaces it, matching the
/// array-store semantics the selection code expects.
#[derive(Debug, Clone)]
pub struct EventBatch {
    n_events: usize,
    scalar_names: Vec<String>,
    scalars: Vec<Column>,
    name_to_index: HashMap<String, usize>,
    collections: BTreeMap<String, Collection>,
}

impl EventBatch {
    /// Create an empty batch of `n_events` events.
    pub fn new(n_events: usize) -> Self {
        Self {
            n_events,
            scalar_names: Vec::new(),
            scalars: Vec::new(),
            name_to_index: HashMap::new(),
            collections: BTreeMap::new(),
        }
    }

    /// Number of events in the batch.
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Scalar column names in insertion order.
    pub fn scalar_names(&self) -> &[String] {
        &self.scalar_names
    }

    /// Collection names.
    pub fn collection_names(&self) -> impl Iterator<Item = &String> {
        self.collections.keys()
    }

    /// Whether a scalar column exists.
    pub fn has_scalar(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// A scalar column by name.
    pub fn scalar(&self, name: &str) -> Option<&Column> {
        let idx = self.name_to_index.get(name).copied()?;
        self.scalars.get(idx)
    }

    /// A numeric scalar column, as an error when absent or boolean.
    pub fn f64s(&self, name: &str) -> Result<&[f64]> {
        match self.scalar(name) {
            Some(Column::F64(v)) => Ok(v),
            Some(Column::Bool(_)) => {
                Err(Error::Column(format!("scalar '{name}' is boolean, expected numeric")))
            }
            None => Err(Error::Column(format!("no scalar column '{name}'"))),
        }
    }

    /// A boolean scalar column, as an error when absent or numeric.
    pub fn bools(&self, name: &str) -> Result<&[bool]> {
        match self.scalar(name) {
            Some(Column::Bool(v)) => Ok(v),
            Some(Column::F64(_)) => {
                Err(Error::Column(format!("scalar '{name}' is numeric, expected boolean")))
            }
            None => Err(Error::Column(format!("no scalar column '{name}'"))),
        }
    }

    /// Add or replace a scalar column.
    pub fn set_scalar(&mut self, name: &str, column: Column) -> Result<()> {
        if column.len() != self.n_events {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                expected: self.n_events,
                got: column.len(),
            });
        }
        match self.name_to_index.get(name) {
            Some(&idx) => self.scalars[idx] = column,
            None => {
                self.name_to_index.insert(name.to_string(), self.scalars.len());
                self.scalar_names.push(name.to_string());
                self.scalars.push(column);
            }
        }
        Ok(())
    }

    /// Add or replace a numeric scalar column.
    pub fn set_f64s(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.set_scalar(name, Column::F64(values))
    }

    /// Add or replace a boolean scalar column.
    pub fn set_bools(&mut self, name: &str, values: Vec<bool>) -> Result<()> {
        self.set_scalar(name, Column::Bool(values))
    }

    /// A collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// A collection by name, as an error when absent.
    pub fn require_collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::Column(format!("no collection '{name}'")))
    }

    /// Add or replace a collection. Its event count must match the batch.
    pub fn set_collection(&mut self, name: &str, collection: Collection) -> Result<()> {
        if collection.n_events() != self.n_events {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                expected: self.n_events,
                got: collection.n_events(),
            });
        }
        self.collections.insert(name.to_string(), collection);
        Ok(())
    }

    /// Per-event mask from a predicate over a numeric scalar.
    pub fn mask_f64(&self, name: &str, pred: impl Fn(f64) -> bool) -> Result<Mask> {
        Ok(Mask::from_f64s(self.f64s(name)?, pred))
    }

    /// Per-event mask from a boolean scalar.
    pub fn mask_bool(&self, name: &str) -> Result<Mask> {
        Ok(Mask::from_bools(self.bools(name)?))
    }

    /// Keep only the events flagged in `mask`; every scalar and collection is
    /// filtered identically.
    pub fn filter(&self, mask: &Mask) -> Result<EventBatch> {
        if mask.len() != self.n_events {
            return Err(Error::LengthMismatch {
                name: "event mask".into(),
                expected: self.n_events,
                got: mask.len(),
            });
        }
        let mut out = EventBatch::new(mask.count());
        for (name, column) in self.scalar_names.iter().zip(&self.scalars) {
            let filtered = match column {
                Column::F64(v) => Column::F64(
                    v.iter().zip(mask.iter()).filter(|(_, k)| *k).map(|(&x, _)| x).collect(),
                ),
                Column::Bool(v) => Column::Bool(
                    v.iter().zip(mask.iter()).filter(|(_, k)| *k).map(|(&x, _)| x).collect(),
                ),
            };
            out.set_scalar(name, filtered)?;
        }
        for (name, coll) in &self.collections {
            out.set_collection(name, coll.filter_events(mask)?)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Collection;

    fn batch() -> EventBatch {
        let mut b = EventBatch::new(3);
        b.set_f64s("event", vec![1.0, 2.0, 3.0]).unwrap();
        b.set_bools("Flag.goodVertices", vec![true, true, false]).unwrap();
        b.set_collection(
            "Jet",
            Collection::from_fields(vec![0, 2, 2, 3], [("pt".to_string(), vec![40.0, 25.0, 60.0])])
                .unwrap(),
        )
        .unwrap();
        b
    }

    #[test]
    fn scalar_type_checking() {
        let b = batch();
        assert!(b.f64s("event").is_ok());
        assert!(b.f64s("Flag.goodVertices").is_err());
        assert!(b.bools("event").is_err());
        assert!(b.f64s("missing").is_err());
    }

    #[test]
    fn set_scalar_replaces() {
        let mut b = batch();
        b.set_f64s("event", vec![9.0, 9.0, 9.0]).unwrap();
        assert_eq!(b.f64s("event").unwrap(), &[9.0, 9.0, 9.0]);
        assert_eq!(b.scalar_names().len(), 2);
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut b = batch();
        assert!(b.set_f64s("bad", vec![1.0]).is_err());
    }

    #[test]
    fn filter_applies_to_everything() {
        let b = batch();
        let kept = b.filter(&Mask::from_bools(&[true, false, true])).unwrap();
        assert_eq!(kept.n_events(), 2);
        assert_eq!(kept.f64s("event").unwrap(), &[1.0, 3.0]);
        assert_eq!(kept.bools("Flag.goodVertices").unwrap(), &[true, false]);
        assert_eq!(kept.collection("Jet").unwrap().counts(), vec![2, 1]);
    }
}
