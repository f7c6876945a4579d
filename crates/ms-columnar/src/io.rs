//! Parquet / Arrow I/O for event batches and minitree snapshots.
//!
//! # Schema: `minisel_events_v1`
//!
//! | Column kind          | Arrow type      | Batch representation            |
//! |----------------------|-----------------|---------------------------------|
//! | scalar numeric       | `Float64`       | scalar column                   |
//! | scalar flag          | `Boolean`       | boolean scalar column           |
//! | `<coll>.<field>`     | `List<Float64>` | field of collection `<coll>`    |
//! | undotted list column | `List<Float64>` | single-field collection `value` |
//!
//! All `List` columns of one collection must share identical offsets; the
//! reader rejects files where they disagree.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Float64Builder, ListArray, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use ms_core::{Error, Result};

use crate::{Collection, Column, EventBatch, Snapshot, SnapshotValue};

/// Schema version string embedded in Parquet key-value metadata.
pub const EVENTS_SCHEMA_V1: &str = "minisel_events_v1";

/// Parquet metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "minisel.schema_version";

fn list_column(offsets: &[usize], values: &[f64]) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for w in offsets.windows(2) {
        for &v in &values[w[0]..w[1]] {
            builder.values().append_value(v);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn write_record_batch(path: &Path, columns: Vec<(String, ArrayRef)>) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::Parquet(format!("nothing to write to {}", path.display())));
    }
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
        .collect();
    let metadata = std::collections::HashMap::from([(
        META_KEY_SCHEMA_VERSION.to_string(),
        EVENTS_SCHEMA_V1.to_string(),
    )]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
    let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, a)| a).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| Error::Parquet(format!("building record batch: {e}")))?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| Error::Parquet(format!("opening writer for {}: {e}", path.display())))?;
    writer.write(&batch).map_err(|e| Error::Parquet(format!("writing batch: {e}")))?;
    writer.close().map_err(|e| Error::Parquet(format!("closing writer: {e}")))?;
    Ok(())
}

/// Write a full event batch (scalars + collections) to Parquet.
pub fn write_event_batch(batch: &EventBatch, path: &Path) -> Result<()> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::new();
    for name in batch.scalar_names() {
        let array: ArrayRef = match batch.scalar(name) {
            Some(Column::F64(v)) => Arc::new(Float64Array::from(v.clone())),
            Some(Column::Bool(v)) => Arc::new(BooleanArray::from(v.clone())),
            None => continue,
        };
        columns.push((name.clone(), array));
    }
    for coll_name in batch.collection_names() {
        let coll = batch.collection(coll_name).ok_or_else(|| {
            Error::Column(format!("collection '{coll_name}' disappeared during write"))
        })?;
        for field in coll.field_names() {
            let values = coll.field(field).unwrap_or_default();
            columns.push((format!("{coll_name}.{field}"), list_column(coll.offsets(), values)));
        }
    }
    write_record_batch(path, columns)
}

/// Write one minitree snapshot to Parquet.
pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::new();
    for (name, value) in snapshot {
        let array: ArrayRef = match value {
            SnapshotValue::Scalar(v) => Arc::new(Float64Array::from(v.clone())),
            SnapshotValue::Jagged { offsets, values } => list_column(offsets, values),
        };
        columns.push((name.clone(), array));
    }
    write_record_batch(path, columns)
}

fn jagged_from_list(name: &str, array: &ListArray) -> Result<(Vec<usize>, Vec<f64>)> {
    let offsets: Vec<usize> = array.value_offsets().iter().map(|&o| o as usize).collect();
    let values = array
        .values()
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Parquet(format!("list column '{name}' is not List<Float64>")))?;
    if values.null_count() > 0 {
        return Err(Error::Parquet(format!("list column '{name}' contains nulls")));
    }
    // Offsets from a sliced array may not start at zero.
    let base = *offsets.first().unwrap_or(&0);
    let flat: Vec<f64> = (offsets[0]..*offsets.last().unwrap_or(&0))
        .map(|i| values.value(i))
        .collect();
    Ok((offsets.iter().map(|&o| o - base).collect(), flat))
}

/// Read a Parquet events file into an [`EventBatch`].
pub fn read_event_batch(path: &Path) -> Result<EventBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Parquet(format!("opening {}: {e}", path.display())))?;
    let schema = builder.schema().clone();
    let reader =
        builder.build().map_err(|e| Error::Parquet(format!("reading {}: {e}", path.display())))?;

    let batches: Vec<RecordBatch> = reader
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Parquet(format!("decoding {}: {e}", path.display())))?;
    let record = arrow::compute::concat_batches(&schema, &batches)
        .map_err(|e| Error::Parquet(format!("concatenating row groups: {e}")))?;

    let n_events = record.num_rows();
    let mut batch = EventBatch::new(n_events);
    // collection -> field -> (offsets, flat values)
    let mut jagged: BTreeMap<String, Vec<(String, Vec<usize>, Vec<f64>)>> = BTreeMap::new();

    for (field, column) in schema.fields().iter().zip(record.columns()) {
        let name = field.name();
        match field.data_type() {
            DataType::Float64 => {
                let array = column
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| Error::Parquet(format!("column '{name}' type mismatch")))?;
                batch.set_f64s(name, (0..n_events).map(|i| array.value(i)).collect())?;
            }
            DataType::Boolean => {
                let array = column
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| Error::Parquet(format!("column '{name}' type mismatch")))?;
                batch.set_bools(name, (0..n_events).map(|i| array.value(i)).collect())?;
            }
            DataType::List(_) => {
                let array = column
                    .as_any()
                    .downcast_ref::<ListArray>()
                    .ok_or_else(|| Error::Parquet(format!("column '{name}' type mismatch")))?;
                let (offsets, values) = jagged_from_list(name, array)?;
                let (coll, field_name) = match name.split_once('.') {
                    Some((c, f)) => (c.to_string(), f.to_string()),
                    None => (name.to_string(), "value".to_string()),
                };
                jagged.entry(coll).or_default().push((field_name, offsets, values));
            }
            other => {
                tracing::warn!("skipping column '{name}' with unsupported type {other:?}");
            }
        }
    }

    for (coll_name, fields) in jagged {
        let offsets = fields[0].1.clone();
        for (field_name, field_offsets, _) in &fields {
            if *field_offsets != offsets {
                return Err(Error::Parquet(format!(
                    "collection '{coll_name}' has inconsistent offsets (field '{field_name}')"
                )));
            }
        }
        let coll = Collection::from_fields(
            offsets,
            fields.into_iter().map(|(f, _, v)| (f, v)),
        )?;
        batch.set_collection(&coll_name, coll)?;
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("minisel_{}_{name}", std::process::id()))
    }

    fn toy_batch() -> EventBatch {
        let mut b = EventBatch::new(3);
        b.set_f64s("event", vec![1.0, 2.0, 3.0]).unwrap();
        b.set_bools("Flag.goodVertices", vec![true, false, true]).unwrap();
        b.set_collection(
            "Jet",
            Collection::from_fields(
                vec![0, 2, 2, 3],
                [
                    ("pt".to_string(), vec![45.0, 32.0, 61.0]),
                    ("eta".to_string(), vec![0.3, -1.8, 2.2]),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        b
    }

    #[test]
    fn event_batch_roundtrip() {
        let path = tmp_path("roundtrip.parquet");
        let batch = toy_batch();
        write_event_batch(&batch, &path).unwrap();
        let read = read_event_batch(&path).unwrap();
        assert_eq!(read.n_events(), 3);
        assert_eq!(read.f64s("event").unwrap(), batch.f64s("event").unwrap());
        assert_eq!(
            read.bools("Flag.goodVertices").unwrap(),
            batch.bools("Flag.goodVertices").unwrap()
        );
        let jets = read.collection("Jet").unwrap();
        assert_eq!(jets.counts(), vec![2, 0, 1]);
        assert_eq!(jets.field("pt").unwrap(), &[45.0, 32.0, 61.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn snapshot_roundtrip() {
        let path = tmp_path("snapshot.parquet");
        let snapshot = Snapshot::from([
            ("weight".to_string(), SnapshotValue::Scalar(vec![1.0, 0.5])),
            (
                "jets.pt".to_string(),
                SnapshotValue::Jagged { offsets: vec![0, 1, 3], values: vec![40.0, 30.0, 20.0] },
            ),
        ]);
        write_snapshot(&snapshot, &path).unwrap();
        let read = read_event_batch(&path).unwrap();
        assert_eq!(read.f64s("weight").unwrap(), &[1.0, 0.5]);
        let jets = read.collection("jets").unwrap();
        assert_eq!(jets.counts(), vec![1, 2]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_write_is_an_error() {
        let path = tmp_path("empty.parquet");
        assert!(write_snapshot(&Snapshot::new(), &path).is_err());
    }
}
