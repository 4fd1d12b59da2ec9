//! Histogram and cutflow value types shared across the workspace.

use serde::{Deserialize, Serialize};

/// A 1D weighted histogram with equal-width bins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Bin edges (length = n_bins + 1, ascending).
    pub bin_edges: Vec<f64>,
    /// Bin contents, sum of weights per bin (length = n_bins).
    pub bin_counts: Vec<f64>,
}

impl Histogram {
    /// Create a zero-filled histogram with `nbins` equal-width bins over
    /// `[min, max)`.
    pub fn zeroed(name: impl Into<String>, nbins: usize, min: f64, max: f64) -> Self {
        let width = (max - min) / nbins as f64;
        let bin_edges = (0..=nbins).map(|i| min + i as f64 * width).collect();
        Histogram { name: name.into(), bin_edges, bin_counts: vec![0.0; nbins] }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bin_counts.len()
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.bin_edges[0]
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.bin_edges[self.bin_edges.len() - 1]
    }

    /// Sum of all bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_counts.iter().sum()
    }
}

/// One row of a cutflow report: cumulative events surviving a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CutflowEntry {
    /// Stage name.
    pub stage: String,
    /// Events passing this stage and every stage before it.
    pub passed: usize,
}

/// Persisted per-run output: kinematic histograms, yield histograms, and a
/// one-row metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    /// Run number.
    pub run: u32,
    /// Recorded luminosity in fb^-1, if known for this run.
    pub luminosity: Option<f64>,
    /// Per-run kinematic/diagnostic histograms.
    pub histograms: Vec<Histogram>,
    /// Run-number-axis yield histograms (one bin per run).
    pub yields: Vec<Histogram>,
}
