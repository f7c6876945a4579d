//! Snapshot projection: event batch -> reduced minitree columns.

use std::collections::BTreeMap;

use ms_core::TreeStructure;

use crate::{Column, EventBatch};

/// One materialized minitree column.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    /// Per-event scalar values (booleans are widened to 0/1).
    Scalar(Vec<f64>),
    /// Jagged per-event values with `n_events + 1` offsets.
    Jagged {
        /// Event boundaries.
        offsets: Vec<usize>,
        /// Flat values.
        values: Vec<f64>,
    },
}

impl SnapshotValue {
    /// Number of events covered.
    pub fn n_events(&self) -> usize {
        match self {
            SnapshotValue::Scalar(v) => v.len(),
            SnapshotValue::Jagged { offsets, .. } => offsets.len().saturating_sub(1),
        }
    }
}

/// A materialized snapshot: output branch name -> column.
pub type Snapshot = BTreeMap<String, SnapshotValue>;

/// Project a (typically already filtered) batch through the output-tree
/// structure.
///
/// Missing fields are skipped with a warning rather than failing the batch.
/// With `empty_reco`, every non-generator output is replaced by the pad
/// sentinel, which is how signal step-0 snapshots record events that never
/// reached reconstruction.
pub fn make_snapshot(batch: &EventBatch, structure: &TreeStructure, empty_reco: bool) -> Snapshot {
    let n = batch.n_events();
    let sentinel = || SnapshotValue::Scalar(vec![crate::SENTINEL; n]);
    let mut minitree = Snapshot::new();

    for (key, spec) in structure {
        if let Some(coll_name) = spec.strip_suffix('.') {
            // Whole-collection copy: one output column per field.
            let Some(coll) = batch.collection(coll_name) else {
                tracing::warn!("snapshot: collection '{coll_name}' not found in events");
                continue;
            };
            if empty_reco && !coll_name.contains("gen") {
                minitree.insert(key.clone(), sentinel());
                continue;
            }
            for field in coll.field_names() {
                let values = coll.field(field).unwrap_or_default().to_vec();
                minitree.insert(
                    format!("{key}.{field}"),
                    SnapshotValue::Jagged { offsets: coll.offsets().to_vec(), values },
                );
            }
            continue;
        }

        if empty_reco && !spec.contains("gen") {
            minitree.insert(key.clone(), sentinel());
            continue;
        }

        // Scalar column (dotted names cover record scalars like "PuppiMET.pt").
        if let Some(column) = batch.scalar(spec) {
            let values = match column {
                Column::F64(v) => v.clone(),
                Column::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            };
            minitree.insert(key.clone(), SnapshotValue::Scalar(values));
            continue;
        }

        // Single collection column ("Jet_selected.pt").
        if let Some((coll_name, field)) = spec.split_once('.') {
            match batch.collection(coll_name).and_then(|c| c.field(field)) {
                Some(values) => {
                    let offsets =
                        batch.collection(coll_name).map(|c| c.offsets().to_vec()).unwrap_or_default();
                    minitree.insert(
                        key.clone(),
                        SnapshotValue::Jagged { offsets, values: values.to_vec() },
                    );
                }
                None => tracing::warn!("snapshot: field '{spec}' not found in events"),
            }
            continue;
        }

        tracing::warn!("snapshot: field '{spec}' not found in events");
    }

    minitree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Collection;

    fn batch() -> EventBatch {
        let mut b = EventBatch::new(2);
        b.set_f64s("eventWeight", vec![1.5, 0.5]).unwrap();
        b.set_f64s("llbar.mass", vec![91.0, 45.0]).unwrap();
        b.set_bools("Flag.goodVertices", vec![true, false]).unwrap();
        b.set_collection(
            "Jet_selected",
            Collection::from_fields(
                vec![0, 1, 3],
                [
                    ("pt".to_string(), vec![55.0, 40.0, 31.0]),
                    ("eta".to_string(), vec![0.1, -0.7, 1.9]),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        b
    }

    fn structure() -> TreeStructure {
        TreeStructure::from([
            ("weight".to_string(), "eventWeight".to_string()),
            ("mll".to_string(), "llbar.mass".to_string()),
            ("jets".to_string(), "Jet_selected.".to_string()),
            ("jet_pt".to_string(), "Jet_selected.pt".to_string()),
            ("nope".to_string(), "missingField".to_string()),
        ])
    }

    #[test]
    fn projects_scalars_and_collections() {
        let snap = make_snapshot(&batch(), &structure(), false);
        assert_eq!(snap.get("weight"), Some(&SnapshotValue::Scalar(vec![1.5, 0.5])));
        assert_eq!(snap.get("mll"), Some(&SnapshotValue::Scalar(vec![91.0, 45.0])));
        assert!(snap.contains_key("jets.pt"));
        assert!(snap.contains_key("jets.eta"));
        assert_eq!(
            snap.get("jet_pt"),
            Some(&SnapshotValue::Jagged {
                offsets: vec![0, 1, 3],
                values: vec![55.0, 40.0, 31.0]
            })
        );
        // Missing source field is skipped, not fatal.
        assert!(!snap.contains_key("nope"));
    }

    #[test]
    fn empty_reco_pads_non_gen_outputs() {
        let mut structure = structure();
        structure.insert("gen_mll".to_string(), "genLLbar.mass".to_string());
        let mut b = batch();
        b.set_f64s("genLLbar.mass", vec![120.0, 80.0]).unwrap();
        let snap = make_snapshot(&b, &structure, true);
        assert_eq!(snap.get("weight"), Some(&SnapshotValue::Scalar(vec![-999.0, -999.0])));
        assert_eq!(snap.get("jets"), Some(&SnapshotValue::Scalar(vec![-999.0, -999.0])));
        assert_eq!(snap.get("gen_mll"), Some(&SnapshotValue::Scalar(vec![120.0, 80.0])));
    }

    #[test]
    fn bool_scalar_widens() {
        let structure =
            TreeStructure::from([("pv".to_string(), "Flag.goodVertices".to_string())]);
        let snap = make_snapshot(&batch(), &structure, false);
        assert_eq!(snap.get("pv"), Some(&SnapshotValue::Scalar(vec![1.0, 0.0])));
    }
}
