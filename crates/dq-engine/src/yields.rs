//! The fixed set of run-indexed yield histograms.
//!
//! Each run books one bin over `[run, run+1)` per yield; the merge stage
//! later concatenates these single-run histograms along the run axis.

use crate::booking::HistogramSpec;

/// `(histogram name, weighting count column)`; `None` counts raw events.
const YIELD_SET: &[(&str, Option<&str>)] = &[
    ("Yield", None),
    ("TrkYield", Some("NTracks")),
    ("PosTrkYield", Some("NPosTracks")),
    ("NegTrkYield", Some("NNegTracks")),
    ("GoodTrkYield", Some("NGoodTracks")),
    ("GoodPosTrkYield", Some("NGoodPosTracks")),
    ("GoodNegTrkYield", Some("NGoodNegTracks")),
];

/// Specs for the standard yield histograms of one run.
pub fn yield_specs(run: u32) -> Vec<HistogramSpec> {
    YIELD_SET
        .iter()
        .map(|(name, weight_column)| HistogramSpec {
            name: name.to_string(),
            column: Some("run".to_string()),
            nbins: 1,
            min: run as f64,
            max: (run + 1) as f64,
            unit_scale: None,
            local_cut: None,
            weight_column: weight_column.map(|c| c.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::book_histograms;
    use crate::column::{Column, EventBatch};

    #[test]
    fn yields_cover_exactly_one_run() {
        let specs = yield_specs(16000);
        assert_eq!(specs.len(), 7);
        for s in &specs {
            assert_eq!(s.nbins, 1);
            assert_eq!(s.min, 16000.0);
            assert_eq!(s.max, 16001.0);
        }
    }

    #[test]
    fn yields_count_events_and_tracks() {
        let batch = EventBatch::new([
            ("run".to_string(), Column::Scalar(vec![16000.0; 3])),
            ("NTracks".to_string(), Column::Scalar(vec![2.0, 0.0, 1.0])),
            ("NPosTracks".to_string(), Column::Scalar(vec![1.0, 0.0, 1.0])),
            ("NNegTracks".to_string(), Column::Scalar(vec![1.0, 0.0, 0.0])),
            ("NGoodTracks".to_string(), Column::Scalar(vec![1.0, 0.0, 1.0])),
            ("NGoodPosTracks".to_string(), Column::Scalar(vec![1.0, 0.0, 1.0])),
            ("NGoodNegTracks".to_string(), Column::Scalar(vec![0.0, 0.0, 0.0])),
        ])
        .unwrap();
        // Yields are never luminosity-weighted.
        let out = book_histograms(&batch, &yield_specs(16000), 1.0).unwrap();
        let by_name = |n: &str| {
            out.histograms.iter().find(|h| h.name == n).unwrap().bin_counts[0]
        };
        assert_eq!(by_name("Yield"), 3.0);
        assert_eq!(by_name("TrkYield"), 3.0);
        assert_eq!(by_name("PosTrkYield"), 2.0);
        assert_eq!(by_name("NegTrkYield"), 1.0);
        assert_eq!(by_name("GoodTrkYield"), 2.0);
    }
}
