//! Arrow view of a migrated archive: one row per finding.
//!
//! Rows follow archive key order, then each image's finding order.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::repr::InternalRepr;
use crate::schema::Finding;

/// Schema for the flat findings table.
pub fn findings_schema() -> Schema {
    Schema::new(vec![
        Field::new("image_key", DataType::Utf8, false),
        Field::new("finding_id", DataType::Utf8, false),
        Field::new("label", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("explanation", DataType::Utf8, false),
        Field::new("x_min", DataType::Float64, false),
        Field::new("y_min", DataType::Float64, false),
        Field::new("x_max", DataType::Float64, false),
        Field::new("y_max", DataType::Float64, false),
        Field::new("severity", DataType::Float64, false),
        Field::new("color", DataType::Utf8, false),
    ])
}

/// Flatten every image's findings into a single RecordBatch.
pub fn findings_batch(labels: &BTreeMap<String, InternalRepr>) -> Result<RecordBatch, ArrowError> {
    let rows: Vec<(&str, &Finding)> = labels
        .iter()
        .flat_map(|(key, repr)| repr.output.iter().map(move |f| (key.as_str(), f)))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(k, _)| *k))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, f)| f.id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, f)| f.label.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, f)| f.description.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, f)| f.explanation.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|(_, f)| f.bounding_box.x_min()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|(_, f)| f.bounding_box.y_min()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|(_, f)| f.bounding_box.x_max()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|(_, f)| f.bounding_box.y_max()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|(_, f)| f.severity),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, f)| f.color.as_str()),
        )),
    ];

    RecordBatch::try_new(Arc::new(findings_schema()), columns)
}
