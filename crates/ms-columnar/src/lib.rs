//! # ms-columnar
//!
//! Columnar event batches for the minisel selection pipeline: packed boolean
//! masks, scalar columns and jagged object collections, snapshot projection
//! into minitree columns, 4-vector helpers, and Parquet I/O.
//!
//! ## Example
//!
//! ```
//! use ms_columnar::{Collection, EventBatch, Mask};
//!
//! let mut batch = EventBatch::new(3);
//! batch.set_f64s("met", vec![12.0, 55.0, 80.0]).unwrap();
//! let pass = batch.mask_f64("met", |met| met > 40.0).unwrap();
//! assert_eq!(pass.count(), 2);
//! let survivors = batch.filter(&pass).unwrap();
//! assert_eq!(survivors.n_events(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod collection;
pub mod fourvec;
pub mod io;
pub mod mask;
pub mod snapshot;
pub mod weights;

pub use batch::{Column, EventBatch};
pub use collection::Collection;
pub use fourvec::{delta_r, p4_sum_columns, P4, SENTINEL};
pub use io::{read_event_batch, write_event_batch, write_snapshot, EVENTS_SCHEMA_V1};
pub use mask::Mask;
pub use snapshot::{make_snapshot, Snapshot, SnapshotValue};
pub use weights::make_weight_fields;
