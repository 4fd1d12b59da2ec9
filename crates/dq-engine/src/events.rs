//! Columnar event-batch files.
//!
//! The upstream ntuple store is outside this crate; per-run event tables
//! arrive as JSON column files: `{"columns": {name: [..] | [[..], ..]}}`.
//! Scalar columns are flat arrays, per-track columns are arrays of
//! arrays.

use std::fs;
use std::path::Path;

use dq_core::Result;
use serde::Deserialize;
use tracing::info;

use crate::column::{Column, EventBatch};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnPayload {
    Jagged(Vec<Vec<f64>>),
    Scalar(Vec<f64>),
}

#[derive(Debug, Deserialize)]
struct EventFile {
    columns: std::collections::BTreeMap<String, ColumnPayload>,
}

/// Read one run's event batch from a JSON column file.
///
/// All columns must cover the same number of events.
pub fn read_event_batch(path: &Path) -> Result<EventBatch> {
    let text = fs::read_to_string(path)?;
    let file: EventFile = serde_json::from_str(&text)?;
    let batch = EventBatch::new(file.columns.into_iter().map(|(name, payload)| {
        let column = match payload {
            ColumnPayload::Scalar(v) => Column::Scalar(v),
            ColumnPayload::Jagged(v) => Column::Jagged(v),
        };
        (name, column)
    }))?;
    info!(path = %path.display(), events = batch.n_events(), "event batch loaded");
    Ok(batch)
}
