//! Declarative histogram booking against a filtered event view.
//!
//! Each spec is validated, optionally filtered by its own local cut, and
//! accumulated into equal-width bins over `[min, max)`. Values outside the
//! range are clipped out entirely (no overflow bins) and NaN values are
//! never binned. Specs share no mutable state, so booking runs in
//! parallel across specs.

use dq_core::{CutflowEntry, Error, Histogram, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::column::{Column, EventBatch};
use crate::expr::SelectionExpr;

/// A per-histogram filter, scoped to one spec only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalCut {
    /// Row name in the local mini-cutflow.
    pub name: String,
    /// Selection expression over scalar columns.
    pub expression: String,
}

/// Declarative description of one histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramSpec {
    /// Histogram name.
    pub name: String,
    /// Column to histogram; defaults to `name`.
    #[serde(default)]
    pub column: Option<String>,
    /// Number of equal-width bins.
    pub nbins: usize,
    /// Lower edge (inclusive).
    pub min: f64,
    /// Upper edge (exclusive).
    pub max: f64,
    /// Multiplicative transform applied to values before binning.
    #[serde(default)]
    pub unit_scale: Option<f64>,
    /// Additional filter applied only to this histogram.
    #[serde(default)]
    pub local_cut: Option<LocalCut>,
    /// Scalar column whose per-event value multiplies the run weight
    /// (used by the run-indexed yield histograms).
    #[serde(default)]
    pub weight_column: Option<String>,
}

impl HistogramSpec {
    /// Column this spec histograms.
    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Structural validation: `nbins >= 1`, `min < max`.
    pub fn validate(&self) -> Result<()> {
        if self.nbins == 0 {
            return Err(Error::InvalidSpec(format!("spec '{}': nbins must be >= 1", self.name)));
        }
        // NaN bounds must fail too, so compare via partial_cmp.
        if self.min.partial_cmp(&self.max) != Some(std::cmp::Ordering::Less) {
            return Err(Error::InvalidSpec(format!(
                "spec '{}': min ({}) must be < max ({})",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Result of one booking call.
#[derive(Debug, Clone)]
pub struct BookingOutput {
    /// One histogram per spec, in spec order.
    pub histograms: Vec<Histogram>,
    /// Local mini-cutflow rows from specs with a local cut, in spec order.
    pub local_cutflow: Vec<CutflowEntry>,
}

/// The uniform per-event weight for one run.
///
/// Luminosity divided by observed event count; an unknown luminosity books
/// the run unweighted, and a zero event count forces the denominator to 1.
pub fn run_weight(run: u32, luminosity: Option<f64>, n_events: usize) -> f64 {
    let Some(lumi) = luminosity else {
        warn!(run, "no luminosity for run; booking unweighted");
        return 1.0;
    };
    let denominator = if n_events == 0 {
        warn!(run, "zero events after filtering; weight denominator forced to 1");
        1
    } else {
        n_events
    };
    lumi / denominator as f64
}

struct BookedSpec {
    histogram: Histogram,
    local_row: Option<CutflowEntry>,
}

fn book_one(batch: &EventBatch, spec: &HistogramSpec, weight: f64) -> Result<BookedSpec> {
    spec.validate()?;

    let column_name = spec.column();
    if !batch.has_column(column_name) {
        return Err(Error::MissingColumn {
            spec: spec.name.clone(),
            column: column_name.to_string(),
        });
    }

    // Local cut: filter scoped to this one spec.
    let mut local_row = None;
    let scoped;
    let view = match &spec.local_cut {
        Some(cut) => {
            let mask = SelectionExpr::parse(&cut.expression)?.eval_mask(batch)?;
            scoped = batch.filtered(&mask)?;
            local_row =
                Some(CutflowEntry { stage: cut.name.clone(), passed: scoped.n_events() });
            &scoped
        }
        None => batch,
    };

    let weights: Option<&[f64]> = match &spec.weight_column {
        Some(wc) => Some(view.column(wc).map(|c| c.as_scalar()).transpose()?.ok_or_else(
            || Error::MissingColumn { spec: spec.name.clone(), column: wc.clone() },
        )?),
        None => None,
    };

    let mut histogram = Histogram::zeroed(&spec.name, spec.nbins, spec.min, spec.max);
    let scale = spec.unit_scale.unwrap_or(1.0);
    let width = (spec.max - spec.min) / spec.nbins as f64;

    let mut fill = |value: f64, event: usize| {
        let v = value * scale;
        // NaN never bins; the range is half-open [min, max).
        if v.is_nan() || v < spec.min || v >= spec.max {
            return;
        }
        let mut bin = ((v - spec.min) / width) as usize;
        if bin >= spec.nbins {
            bin = spec.nbins - 1;
        }
        let w = weight * weights.map(|ws| ws[event]).unwrap_or(1.0);
        histogram.bin_counts[bin] += w;
    };

    let column = view.column(column_name).ok_or_else(|| Error::MissingColumn {
        spec: spec.name.clone(),
        column: column_name.to_string(),
    })?;
    match column {
        Column::Scalar(values) => {
            for (event, &v) in values.iter().enumerate() {
                fill(v, event);
            }
        }
        Column::Jagged(rows) => {
            for (event, row) in rows.iter().enumerate() {
                for &v in row {
                    fill(v, event);
                }
            }
        }
    }

    Ok(BookedSpec { histogram, local_row })
}

/// Evaluate `specs` against the filtered view, in order.
///
/// Fatal on the first invalid spec or missing column: a broken
/// configuration books zero histograms rather than partial output.
pub fn book_histograms(
    batch: &EventBatch,
    specs: &[HistogramSpec],
    weight: f64,
) -> Result<BookingOutput> {
    let booked: Vec<BookedSpec> = specs
        .par_iter()
        .map(|spec| book_one(batch, spec, weight))
        .collect::<Result<_>>()?;

    let mut histograms = Vec::with_capacity(booked.len());
    let mut local_cutflow = Vec::new();
    for b in booked {
        histograms.push(b.histogram);
        local_cutflow.extend(b.local_row);
    }
    Ok(BookingOutput { histograms, local_cutflow })
}
