//! End-to-end per-run flow: schema resolution, derived fields, cuts,
//! booking, artifact persistence, and the cross-file yield merge.

use std::collections::HashMap;
use std::fs;

use dq_core::RunArtifact;
use dq_engine::{
    book_histograms, detector_stages, merge_artifacts, read_run_artifact, run_weight,
    write_run_artifact, Column, CutPipeline, DerivedFieldEvaluator, EventBatch, HistogramSpec,
    IntervalIndex, IntervalWindow, MergePolicy, SchemaResolver,
};

fn window(start: i64, stop: i64) -> IntervalWindow {
    IntervalWindow { start_utime: start, stop_utime: stop }
}

/// A four-event raw batch for one run, with era-old veto names and one
/// event in an excluded window, one with a saturated timing counter.
fn raw_batch(run: u32) -> EventBatch {
    let n = 4;
    let scalars: Vec<(&str, Vec<f64>)> = vec![
        ("run", vec![run as f64; n]),
        ("eventTime", vec![1010.0, 1150.0, 1200.0, 1300.0]),
        ("Timing0_status", vec![0.0, 0.0, 4.0, 0.0]),
        ("Timing1_status", vec![0.0; n]),
        ("Timing2_status", vec![0.0; n]),
        ("Timing3_status", vec![0.0; n]),
        ("distanceToCollidingBCID", vec![0.0; n]),
        ("TAP", vec![4.0; n]),
        ("Veto10_charge", vec![40.0, 50.0, 60.0, 70.0]),
    ];
    let jagged: Vec<(&str, Vec<Vec<f64>>)> = vec![
        ("Track_nLayers", vec![vec![8.0], vec![8.0, 7.0], vec![8.0], vec![]]),
        ("Track_charge", vec![vec![1.0], vec![1.0, -1.0], vec![1.0], vec![]]),
        ("Track_nDoF", vec![vec![10.0], vec![10.0, 9.0], vec![10.0], vec![]]),
        ("Track_Chi2", vec![vec![10.0], vec![12.0, 9.0], vec![11.0], vec![]]),
        ("Track_pz0", vec![vec![30e3], vec![40e3, 35e3], vec![25e3], vec![]]),
        ("Track_p0", vec![vec![30e3], vec![40e3, 35e3], vec![25e3], vec![]]),
        ("Track_px0", vec![vec![100.0], vec![120.0, -80.0], vec![90.0], vec![]]),
        ("Track_py0", vec![vec![50.0], vec![60.0, 40.0], vec![45.0], vec![]]),
        ("Track_px1", vec![vec![100.0], vec![120.0, -80.0], vec![90.0], vec![]]),
        ("Track_py1", vec![vec![50.0], vec![60.0, 40.0], vec![45.0], vec![]]),
        ("Track_p1", vec![vec![30e3], vec![40e3, 35e3], vec![25e3], vec![]]),
        ("Track_x0", vec![vec![1.0], vec![2.0, 3.0], vec![4.0], vec![]]),
        ("Track_y0", vec![vec![1.0], vec![2.0, 3.0], vec![4.0], vec![]]),
    ];
    EventBatch::new(
        scalars
            .into_iter()
            .map(|(n, v)| (n.to_string(), Column::Scalar(v)))
            .chain(jagged.into_iter().map(|(n, v)| (n.to_string(), Column::Jagged(v)))),
    )
    .unwrap()
}

fn process_run(run: u32, luminosity: Option<f64>) -> RunArtifact {
    let mut batch = raw_batch(run);

    let installed = SchemaResolver::standard().resolve(run, &mut batch);
    assert!(installed.iter().any(|(c, r)| c == "VetoSt10_charge" && r == "Veto10_charge"));

    DerivedFieldEvaluator.augment(&mut batch).unwrap();

    let index = IntervalIndex::new(
        HashMap::from([(run, vec![window(1000, 1400)])]),
        HashMap::from([(run, vec![window(1140, 1160)])]),
    );
    let mut stages = index.time_stages();
    stages.extend(detector_stages().unwrap());
    let (filtered, cutflow) = CutPipeline::new(stages).apply(&batch).unwrap();

    // Event 1 falls in the excluded window; event 2 has Timing0 saturation.
    let passed: Vec<usize> = cutflow.entries().iter().map(|e| e.passed).collect();
    assert_eq!(passed, vec![4, 3, 2, 2, 2]);
    assert!(passed.windows(2).all(|w| w[0] >= w[1]));

    let weight = run_weight(run, luminosity, filtered.n_events());
    let specs = vec![
        HistogramSpec {
            name: "Track_Chi2".into(),
            column: None,
            nbins: 50,
            min: 0.0,
            max: 50.0,
            unit_scale: None,
            local_cut: None,
            weight_column: None,
        },
        HistogramSpec {
            name: "VetoSt10_charge".into(),
            column: None,
            nbins: 50,
            min: 0.01,
            max: 300.0,
            unit_scale: None,
            local_cut: None,
            weight_column: None,
        },
    ];
    let kinematic = book_histograms(&filtered, &specs, weight).unwrap();
    let yields = book_histograms(&filtered, &dq_engine::yield_specs(run), 1.0).unwrap();

    RunArtifact {
        run,
        luminosity,
        histograms: kinematic.histograms,
        yields: yields.histograms,
    }
}

#[test]
fn per_run_flow_books_weighted_histograms() {
    let artifact = process_run(16000, Some(1.0));
    // Two surviving events, weight = 1.0 / 2.
    let chi2 = artifact.histograms.iter().find(|h| h.name == "Track_Chi2").unwrap();
    // Surviving events 0 and 3 carry one track between them.
    assert!((chi2.integral() - 0.5).abs() < 1e-12);

    let veto = artifact.histograms.iter().find(|h| h.name == "VetoSt10_charge").unwrap();
    assert!((veto.integral() - 1.0).abs() < 1e-12);

    let yields = &artifact.yields;
    let by_name = |n: &str| yields.iter().find(|h| h.name == n).unwrap().bin_counts[0];
    assert_eq!(by_name("Yield"), 2.0);
    assert_eq!(by_name("TrkYield"), 1.0);
    assert_eq!(by_name("GoodTrkYield"), 1.0);
}

#[test]
fn artifacts_merge_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("16000.json");
    let path_b = dir.path().join("16003.json");
    write_run_artifact(&path_a, &process_run(16000, Some(1.0))).unwrap();
    write_run_artifact(&path_b, &process_run(16003, None)).unwrap();

    let back = read_run_artifact(&path_a).unwrap();
    assert_eq!(back.run, 16000);

    let merged = merge_artifacts(&[&path_a, &path_b], MergePolicy::Overwrite).unwrap();
    let yield_hist = merged.iter().find(|h| h.name == "Yield").unwrap();
    assert_eq!(
        yield_hist.bin_edges,
        vec![16000.0, 16001.0, 16002.0, 16003.0, 16004.0]
    );
    assert_eq!(yield_hist.bin_counts, vec![2.0, 0.0, 0.0, 2.0]);

    fs::remove_file(&path_b).unwrap();
    assert!(merge_artifacts(&[&path_b], MergePolicy::Overwrite).is_err());
}
