//! Run-number-axis unification of independently produced yield histograms.
//!
//! Inputs are sparse: each file covers the contiguous run range it was
//! produced for, with exactly one integer-width bin per run. Merging
//! allocates a dense, zero-filled array over the union of all input
//! ranges and places each input at its exact integer offset.

use dq_core::{Error, Histogram, Result};
use tracing::warn;

/// A run-indexed histogram plus the identity of the file it came from,
/// used in error reports.
#[derive(Debug, Clone)]
pub struct RunHistogramSet {
    /// Where this histogram came from (file path or label).
    pub source: String,
    /// The histogram; edges must be consecutive integers, width 1.
    pub histogram: Histogram,
}

/// What to do when two inputs cover the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Later input wins silently (parity with the historical combiner).
    #[default]
    Overwrite,
    /// Add overlapping bin contents.
    Sum,
    /// Fail, naming the run and both sources.
    ErrorOnOverlap,
}

impl std::str::FromStr for MergePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overwrite" => Ok(MergePolicy::Overwrite),
            "sum" => Ok(MergePolicy::Sum),
            "error-on-overlap" => Ok(MergePolicy::ErrorOnOverlap),
            other => Err(Error::InvalidSpec(format!(
                "unknown merge policy '{other}' (expected overwrite, sum, or error-on-overlap)"
            ))),
        }
    }
}

/// Edges must be consecutive integers with width-1 bins; returns the first
/// edge as an exact integer.
fn validate_integer_edges(set: &RunHistogramSet) -> Result<i64> {
    let h = &set.histogram;
    if h.bin_edges.len() < 2 {
        return Err(Error::InvalidBinning {
            histogram: h.name.clone(),
            input: set.source.clone(),
            reason: "fewer than two bin edges".into(),
        });
    }
    for (i, &edge) in h.bin_edges.iter().enumerate() {
        if edge.fract() != 0.0 {
            return Err(Error::InvalidBinning {
                histogram: h.name.clone(),
                input: set.source.clone(),
                reason: format!("non-integer bin edge {edge} at index {i}"),
            });
        }
        if i > 0 && edge - h.bin_edges[i - 1] != 1.0 {
            return Err(Error::InvalidBinning {
                histogram: h.name.clone(),
                input: set.source.clone(),
                reason: format!(
                    "bin width {} at index {i}, expected exactly 1",
                    edge - h.bin_edges[i - 1]
                ),
            });
        }
    }
    Ok(h.bin_edges[0] as i64)
}

/// Merge run-indexed histograms sharing one name into a single dense
/// histogram spanning the union of the input run ranges.
///
/// Bins not covered by any input stay zero. Overlap handling is governed
/// by `policy`; under [`MergePolicy::Overwrite`] the later input in list
/// order wins.
pub fn merge_run_histograms(
    sets: &[RunHistogramSet],
    policy: MergePolicy,
) -> Result<Histogram> {
    let first = sets.first().ok_or_else(|| {
        Error::Artifact("cannot merge an empty list of run histogram sets".into())
    })?;

    let mut starts = Vec::with_capacity(sets.len());
    for set in sets {
        if set.histogram.name != first.histogram.name {
            return Err(Error::Artifact(format!(
                "cannot merge '{}' from {} with '{}'",
                set.histogram.name, set.source, first.histogram.name
            )));
        }
        starts.push(validate_integer_edges(set)?);
    }

    let mut r_min = starts[0];
    let mut r_max = first.histogram.x_max() as i64;
    for (set, &start) in sets.iter().zip(&starts) {
        r_min = r_min.min(start);
        r_max = r_max.max(set.histogram.x_max() as i64);
    }
    let n_runs = (r_max - r_min) as usize;

    let mut merged = Histogram::zeroed(&first.histogram.name, n_runs, r_min as f64, r_max as f64);
    let mut writer: Vec<Option<usize>> = vec![None; n_runs];

    for (set_idx, (set, &start)) in sets.iter().zip(&starts).enumerate() {
        let offset = (start - r_min) as usize;
        for (i, &count) in set.histogram.bin_counts.iter().enumerate() {
            let bin = offset + i;
            if let Some(previous) = writer[bin] {
                match policy {
                    MergePolicy::Overwrite => {
                        warn!(
                            run = r_min + bin as i64,
                            first = %sets[previous].source,
                            second = %set.source,
                            "overlapping run; later input overwrites"
                        );
                        merged.bin_counts[bin] = count;
                    }
                    MergePolicy::Sum => merged.bin_counts[bin] += count,
                    MergePolicy::ErrorOnOverlap => {
                        return Err(Error::InvalidBinning {
                            histogram: merged.name.clone(),
                            input: set.source.clone(),
                            reason: format!(
                                "run {} already covered by {}",
                                r_min + bin as i64,
                                sets[previous].source
                            ),
                        });
                    }
                }
            } else {
                merged.bin_counts[bin] = count;
            }
            writer[bin] = Some(set_idx);
        }
    }

    Ok(merged)
}
