//! # ms-cutflow
//!
//! Selection-step bookkeeping for the minisel pipeline: a write-once packed
//! mask registry, immutable step nodes carrying per-channel mask-label
//! lineage, and a per-batch [`CutflowSession`] that ties them together with
//! snapshot materialization and cutflow tables.
//!
//! ## Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use ms_columnar::Mask;
//! use ms_cutflow::{CutflowSession, StepMask, INIT_STEP};
//!
//! let channels = BTreeMap::from([
//!     ("ee".to_string(), Mask::from_bools(&[true, true, false])),
//!     ("mumu".to_string(), Mask::from_bools(&[false, false, true])),
//! ]);
//! let mut session = CutflowSession::new(&channels, "tree_").unwrap();
//! session
//!     .add_step("met", StepMask::Shared(Mask::from_bools(&[true, false, true])), INIT_STEP)
//!     .unwrap();
//! assert_eq!(session.survivors("met", "ee").unwrap().count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cutflow;
pub mod registry;
pub mod session;
pub mod step;

pub use cutflow::{CutflowRow, CutflowTable};
pub use registry::SelectionRegistry;
pub use session::{CutflowSession, Minitree, StepMask, INIT_STEP};
pub use step::StepNode;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use approx::assert_relative_eq;
    use ms_columnar::{EventBatch, Mask, SnapshotValue};
    use ms_core::Error;

    use super::*;

    fn channels() -> BTreeMap<String, Mask> {
        BTreeMap::from([
            ("ee".to_string(), Mask::from_bools(&[true, true, false])),
            ("mumu".to_string(), Mask::from_bools(&[false, false, true])),
        ])
    }

    fn batch() -> EventBatch {
        let mut batch = EventBatch::new(3);
        batch.set_f64s("met_pt", vec![10.0, 50.0, 90.0]).unwrap();
        batch.set_f64s("weight", vec![1.0, 2.0, 3.0]).unwrap();
        batch
    }

    #[test]
    fn empty_channels_rejected() {
        let err = CutflowSession::new(&BTreeMap::new(), "t_").unwrap_err();
        assert!(matches!(err, Error::EmptyChannels));
    }

    #[test]
    fn shared_step_survivors() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        session
            .add_step("cutA", StepMask::Shared(Mask::from_bools(&[true, false, true])), INIT_STEP)
            .unwrap();
        assert_eq!(
            session.survivors("cutA", "ee").unwrap().to_bools(),
            vec![true, false, false]
        );
        assert_eq!(
            session.survivors("cutA", "mumu").unwrap().to_bools(),
            vec![false, false, true]
        );
    }

    #[test]
    fn channel_wise_step_lineage() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        let masks = BTreeMap::from([
            ("ee".to_string(), Mask::from_bools(&[true, false, true])),
            ("mumu".to_string(), Mask::from_bools(&[true, true, true])),
        ]);
        session.add_step("trig", StepMask::PerChannel(masks), INIT_STEP).unwrap();
        let step = session.step("trig").unwrap();
        assert_eq!(step.labels("ee").unwrap(), &["ee".to_string(), "ee_trig".to_string()]);
        assert_eq!(
            step.labels("mumu").unwrap(),
            &["mumu".to_string(), "mumu_trig".to_string()]
        );
        assert_eq!(session.survivors("trig", "ee").unwrap().to_bools(), vec![true, false, false]);
    }

    #[test]
    fn channel_wise_step_must_cover_all_channels() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        let masks =
            BTreeMap::from([("ee".to_string(), Mask::from_bools(&[true, false, true]))]);
        let err = session.add_step("trig", StepMask::PerChannel(masks), INIT_STEP).unwrap_err();
        assert!(matches!(err, Error::MissingChannelMask { channel, .. } if channel == "mumu"));
        // The failed add must not leave partial registrations behind.
        assert!(!session.registry().contains("ee_trig"));
    }

    #[test]
    fn channel_wise_mask_lengths_checked_before_registration() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        let masks = BTreeMap::from([
            ("ee".to_string(), Mask::trues(3)),
            ("mumu".to_string(), Mask::trues(4)),
        ]);
        let err = session.add_step("trig", StepMask::PerChannel(masks), INIT_STEP).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 3, got: 4, .. }));
        // The well-sized ee mask must not be registered either.
        assert!(!session.registry().contains("ee_trig"));
        assert!(session.step("trig").is_none());
    }

    #[test]
    fn missing_parent_rejected() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        let err = session
            .add_step("cutB", StepMask::Shared(Mask::trues(3)), "cutA")
            .unwrap_err();
        assert!(matches!(err, Error::MissingParent { parent, .. } if parent == "cutA"));
    }

    #[test]
    fn duplicate_step_label_rejected() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        session.add_step("cutA", StepMask::Shared(Mask::trues(3)), INIT_STEP).unwrap();
        let err = session
            .add_step("cutA", StepMask::Shared(Mask::trues(3)), INIT_STEP)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(k) if k == "cutA"));
    }

    #[test]
    fn lineage_depth_matches_chain_length() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        session.add_step("a", StepMask::Shared(Mask::trues(3)), INIT_STEP).unwrap();
        session.add_step("b", StepMask::Shared(Mask::trues(3)), "a").unwrap();
        session.add_step("c", StepMask::Shared(Mask::trues(3)), "b").unwrap();
        for label in ["a", "b", "c"] {
            let step = session.step(label).unwrap();
            for chan in ["ee", "mumu"] {
                assert_eq!(step.labels(chan).unwrap().len(), step.depth() + 1);
            }
        }
    }

    #[test]
    fn child_survivors_subset_of_parent() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        session
            .add_step("a", StepMask::Shared(Mask::from_bools(&[true, true, true])), INIT_STEP)
            .unwrap();
        session
            .add_step("b", StepMask::Shared(Mask::from_bools(&[true, false, true])), "a")
            .unwrap();
        for chan in ["ee", "mumu"] {
            let parent = session.survivors("a", chan).unwrap();
            let child = session.survivors("b", chan).unwrap();
            for i in 0..parent.len() {
                assert!(!child.get(i) || parent.get(i));
            }
        }
    }

    #[test]
    fn snapshot_is_read_only_and_repeatable() {
        let mut session = CutflowSession::new(&channels(), "tree_").unwrap();
        session
            .add_step("met", StepMask::Shared(Mask::from_bools(&[true, false, true])), INIT_STEP)
            .unwrap();
        let structure = BTreeMap::from([("met".to_string(), "met_pt".to_string())]);
        let batch = batch();
        session.snapshot(&batch, "met", "after_met", &structure).unwrap();
        session.snapshot(&batch, "met", "after_met_again", &structure).unwrap();

        let tree = session.minitree();
        let ee = &tree["ee"];
        let first = &ee["tree_after_met"];
        let second = &ee["tree_after_met_again"];
        assert_eq!(first, second);
        match &first["met"] {
            SnapshotValue::Scalar(vals) => assert_eq!(vals, &vec![10.0]),
            other => panic!("expected scalar column, got {other:?}"),
        }
        // Re-snapshotting did not grow the step list or the registry.
        assert_eq!(session.steps().count(), 2);
        assert_eq!(session.registry().names().len(), 3);
    }

    #[test]
    fn step0_requires_matching_channel_keys() {
        let mut session = CutflowSession::new(&channels(), "tree_").unwrap();
        let structure = BTreeMap::from([("met".to_string(), "met_pt".to_string())]);
        let wrong = BTreeMap::from([("etau".to_string(), Mask::trues(3))]);
        assert!(session.snapshot_step0(&batch(), &wrong, &structure).is_err());
    }

    #[test]
    fn step0_falls_back_to_reco_channels() {
        let mut session = CutflowSession::new(&channels(), "tree_").unwrap();
        let structure = BTreeMap::from([("met".to_string(), "met_pt".to_string())]);
        session.snapshot_step0(&batch(), &BTreeMap::new(), &structure).unwrap();
        let tree = session.minitree();
        assert!(tree["ee"].contains_key("tree_step0"));
        assert!(tree["mumu"].contains_key("tree_step0"));
    }

    #[test]
    fn cutflow_rows_are_cumulative() {
        let mut session = CutflowSession::new(&channels(), "t_").unwrap();
        session
            .add_step("met", StepMask::Shared(Mask::from_bools(&[true, false, true])), INIT_STEP)
            .unwrap();
        let table = session.cutflow(&batch(), "met", "weight").unwrap();

        let rows = table.rows("ee").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].label, "Initial");
        assert_relative_eq!(rows[0].sum_weights, 6.0);
        assert_relative_eq!(rows[0].sum_weights_sq, 14.0);
        // "ee" keeps events 0 and 1 (weights 1 + 2).
        assert_eq!(rows[1].label, "ee");
        assert_relative_eq!(rows[1].sum_weights, 3.0);
        // ee AND met keeps event 0 only.
        assert_eq!(rows[2].label, "met");
        assert_relative_eq!(rows[2].sum_weights, 1.0);
        assert_relative_eq!(rows[2].sum_weights_sq, 1.0);

        let rows = table.rows("mumu").unwrap();
        assert_relative_eq!(rows[1].sum_weights, 3.0);
        assert_relative_eq!(rows[2].sum_weights, 3.0);

        // Weighted counts never grow along the chain.
        for rows in table.channels.values() {
            for pair in rows.windows(2) {
                assert!(pair[1].sum_weights <= pair[0].sum_weights);
            }
        }
    }
}
