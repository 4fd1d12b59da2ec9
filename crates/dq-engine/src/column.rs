//! Columnar event storage: scalar and per-track (jagged) columns grouped
//! into an immutable batch.

use std::collections::HashMap;
use std::sync::Arc;

use dq_core::{Error, Result};

/// One named column of per-event values.
///
/// Scalar columns hold one value per event; jagged columns hold a small
/// numeric sequence per event (e.g. one entry per reconstructed track).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// One `f64` per event.
    Scalar(Vec<f64>),
    /// One variable-length `f64` sequence per event.
    Jagged(Vec<Vec<f64>>),
}

impl Column {
    /// Number of events covered by this column.
    pub fn n_events(&self) -> usize {
        match self {
            Column::Scalar(v) => v.len(),
            Column::Jagged(v) => v.len(),
        }
    }

    /// Borrow as scalar values, or fail if jagged.
    pub fn as_scalar(&self) -> Result<&[f64]> {
        match self {
            Column::Scalar(v) => Ok(v),
            Column::Jagged(_) => {
                Err(Error::ColumnShape("expected scalar column, found jagged".into()))
            }
        }
    }

    /// Borrow as jagged rows, or fail if scalar.
    pub fn as_jagged(&self) -> Result<&[Vec<f64>]> {
        match self {
            Column::Jagged(v) => Ok(v),
            Column::Scalar(_) => {
                Err(Error::ColumnShape("expected jagged column, found scalar".into()))
            }
        }
    }

    /// Keep only the events where `mask` is true.
    fn filtered(&self, mask: &[bool]) -> Column {
        match self {
            Column::Scalar(v) => Column::Scalar(
                v.iter().zip(mask).filter(|(_, &keep)| keep).map(|(x, _)| *x).collect(),
            ),
            Column::Jagged(v) => Column::Jagged(
                v.iter().zip(mask).filter(|(_, &keep)| keep).map(|(x, _)| x.clone()).collect(),
            ),
        }
    }
}

/// An immutable batch of events for one run, stored column-wise.
///
/// Columns are shared via `Arc`, so installing a schema alias or cloning a
/// batch never copies data. Filtering produces a new, smaller batch.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    n_events: usize,
    columns: HashMap<String, Arc<Column>>,
}

impl EventBatch {
    /// Build a batch from named columns. All columns must cover the same
    /// number of events.
    pub fn new(columns: impl IntoIterator<Item = (String, Column)>) -> Result<Self> {
        let mut batch = EventBatch { n_events: 0, columns: HashMap::new() };
        let mut first = true;
        for (name, col) in columns {
            if first {
                batch.n_events = col.n_events();
                first = false;
            } else if col.n_events() != batch.n_events {
                return Err(Error::ColumnShape(format!(
                    "column '{}' has {} events, expected {}",
                    name,
                    col.n_events(),
                    batch.n_events
                )));
            }
            batch.columns.insert(name, Arc::new(col));
        }
        Ok(batch)
    }

    /// Number of events in the batch.
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name).map(|c| c.as_ref())
    }

    /// Scalar column lookup that reports the requesting spec on failure.
    pub fn scalar(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .ok_or_else(|| Error::ColumnShape(format!("no column '{name}'")))?
            .as_scalar()
    }

    /// Sorted list of the column names present (canonical + derived).
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Install `alias` as a second name for the existing column `target`.
    ///
    /// Fails if `target` is absent; never overrides an existing `alias`.
    pub fn install_alias(&mut self, alias: &str, target: &str) -> Result<()> {
        if self.columns.contains_key(alias) {
            return Ok(());
        }
        let col = self
            .columns
            .get(target)
            .cloned()
            .ok_or_else(|| Error::ColumnShape(format!("alias target '{target}' not found")))?;
        self.columns.insert(alias.to_string(), col);
        Ok(())
    }

    /// Add a derived column. The name must not already exist.
    pub fn add_column(&mut self, name: &str, col: Column) -> Result<()> {
        if col.n_events() != self.n_events {
            return Err(Error::ColumnShape(format!(
                "derived column '{}' has {} events, expected {}",
                name,
                col.n_events(),
                self.n_events
            )));
        }
        if self.columns.contains_key(name) {
            return Err(Error::ColumnShape(format!("column '{name}' already exists")));
        }
        self.columns.insert(name.to_string(), Arc::new(col));
        Ok(())
    }

    /// Produce a new batch containing only the events where `mask` is true.
    pub fn filtered(&self, mask: &[bool]) -> Result<EventBatch> {
        if mask.len() != self.n_events {
            return Err(Error::ColumnShape(format!(
                "mask length {} does not match batch size {}",
                mask.len(),
                self.n_events
            )));
        }
        let n_events = mask.iter().filter(|&&b| b).count();
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), Arc::new(col.filtered(mask))))
            .collect();
        Ok(EventBatch { n_events, columns })
    }
}
