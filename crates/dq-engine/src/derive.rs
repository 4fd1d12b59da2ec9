//! Derived per-event quantities.
//!
//! Each derivation is a pure function of columns that are already present
//! (canonical fields or earlier derivations), applied in one fixed linear
//! order. A derivation never aborts the batch on a bad value: division by
//! zero and out-of-domain trigonometry yield NaN for that element, and the
//! booking engine skips NaN values.

use dq_core::{Error, Result};

use crate::column::{Column, EventBatch};

/// Tolerance for the duplicate-momentum test on split track candidates.
const DUPLICATE_EPS: f64 = 1e-15;

/// Minimum layer count, chi2/dof bound, hit count, and longitudinal
/// momentum (MeV) defining a good track.
const GOOD_TRACK_MIN_LAYERS: f64 = 7.0;
const GOOD_TRACK_MAX_CHI2_PER_DOF: f64 = 25.0;
const GOOD_TRACK_MIN_HITS: f64 = 12.0;
const GOOD_TRACK_MIN_PZ: f64 = 20_000.0;

/// Computes the fixed set of derived fields for a run's batch.
///
/// The evaluation order is the declaration order in [`augment`]; every
/// step only references canonical fields or earlier derivations.
///
/// [`augment`]: DerivedFieldEvaluator::augment
#[derive(Debug, Default, Clone, Copy)]
pub struct DerivedFieldEvaluator;

fn missing(derivation: &str, column: &str) -> Error {
    Error::MissingColumn { spec: derivation.to_string(), column: column.to_string() }
}

fn jagged<'a>(batch: &'a EventBatch, derivation: &str, name: &str) -> Result<&'a [Vec<f64>]> {
    batch.column(name).ok_or_else(|| missing(derivation, name))?.as_jagged()
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

fn map1(rows: &[Vec<f64>], f: impl Fn(f64) -> f64) -> Column {
    Column::Jagged(rows.iter().map(|r| r.iter().map(|&x| f(x)).collect()).collect())
}

fn map2(a: &[Vec<f64>], b: &[Vec<f64>], f: impl Fn(f64, f64) -> f64) -> Column {
    Column::Jagged(
        a.iter()
            .zip(b)
            .map(|(ra, rb)| ra.iter().zip(rb).map(|(&x, &y)| f(x, y)).collect())
            .collect(),
    )
}

fn count_where(rows: &[Vec<f64>], pred: impl Fn(f64) -> bool) -> Column {
    Column::Scalar(rows.iter().map(|r| r.iter().filter(|&&x| pred(x)).count() as f64).collect())
}

/// Per-event count of elements where both flag rows are "true" (> 0).
fn count_where2(
    a: &[Vec<f64>],
    b: &[Vec<f64>],
    pred: impl Fn(f64, f64) -> bool,
) -> Column {
    Column::Scalar(
        a.iter()
            .zip(b)
            .map(|(ra, rb)| ra.iter().zip(rb).filter(|&(&x, &y)| pred(x, y)).count() as f64)
            .collect(),
    )
}

/// Keep elements of `values` where the parallel `flags` row is "true".
fn select_where(values: &[Vec<f64>], flags: &[Vec<f64>], keep: impl Fn(f64) -> bool) -> Column {
    Column::Jagged(
        values
            .iter()
            .zip(flags)
            .map(|(rv, rf)| {
                rv.iter().zip(rf).filter(|&(_, &f)| keep(f)).map(|(&v, _)| v).collect()
            })
            .collect(),
    )
}

/// First-occurrence flags: an element is flagged false when an earlier
/// element of the same event is within `DUPLICATE_EPS` of it.
fn first_occurrence_flags(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| {
            let mut flags = vec![1.0; row.len()];
            for i in 0..row.len() {
                for j in 0..i {
                    if (row[i] - row[j]).abs() < DUPLICATE_EPS {
                        flags[i] = 0.0;
                        break;
                    }
                }
            }
            flags
        })
        .collect()
}

impl DerivedFieldEvaluator {
    /// Add the full set of derived columns to `batch`, in order.
    pub fn augment(&self, batch: &mut EventBatch) -> Result<()> {
        // Track multiplicities
        let n_layers = jagged(batch, "NTracks", "Track_nLayers")?.to_vec();
        batch.add_column(
            "NTracks",
            Column::Scalar(n_layers.iter().map(|r| r.len() as f64).collect()),
        )?;

        let charge = jagged(batch, "NPosTracks", "Track_charge")?.to_vec();
        batch.add_column("NPosTracks", count_where(&charge, |q| q > 0.0))?;
        batch.add_column("NNegTracks", count_where(&charge, |q| q < 0.0))?;

        // Fit quality
        let n_dof = jagged(batch, "Track_nHits", "Track_nDoF")?.to_vec();
        batch.add_column("Track_nHits", map1(&n_dof, |d| d + 5.0))?;

        let chi2 = jagged(batch, "Track_chi2_per_dof", "Track_Chi2")?.to_vec();
        batch.add_column("Track_chi2_per_dof", map2(&chi2, &n_dof, safe_div))?;

        // Good-track flags
        let pz0 = jagged(batch, "GoodTracks", "Track_pz0")?.to_vec();
        let p0 = jagged(batch, "GoodTracks", "Track_p0")?.to_vec();
        let chi2_per_dof = jagged(batch, "GoodTracks", "Track_chi2_per_dof")?.to_vec();
        let n_hits = jagged(batch, "GoodTracks", "Track_nHits")?.to_vec();
        let unique = first_occurrence_flags(&p0);
        let good: Vec<Vec<f64>> = n_layers
            .iter()
            .enumerate()
            .map(|(ev, layers)| {
                (0..layers.len())
                    .map(|i| {
                        let ok = layers[i] >= GOOD_TRACK_MIN_LAYERS
                            && chi2_per_dof[ev][i] < GOOD_TRACK_MAX_CHI2_PER_DOF
                            && n_hits[ev][i] >= GOOD_TRACK_MIN_HITS
                            && pz0[ev][i] > GOOD_TRACK_MIN_PZ
                            && unique[ev][i] > 0.0;
                        if ok {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        batch.add_column("GoodTracks", Column::Jagged(good.clone()))?;
        batch.add_column("NGoodTracks", count_where(&good, |g| g > 0.0))?;
        batch.add_column(
            "NGoodPosTracks",
            count_where2(&good, &charge, |g, q| g > 0.0 && q > 0.0),
        )?;
        batch.add_column(
            "NGoodNegTracks",
            count_where2(&good, &charge, |g, q| g > 0.0 && q < 0.0),
        )?;

        // Kinematics
        batch.add_column("Track_pz_charge0", map2(&pz0, &charge, |pz, q| pz * q))?;

        let px1 = jagged(batch, "Track_theta_x1", "Track_px1")?.to_vec();
        let py1 = jagged(batch, "Track_theta_y1", "Track_py1")?.to_vec();
        let p1 = jagged(batch, "Track_theta_x1", "Track_p1")?.to_vec();
        batch.add_column("Track_theta_x1", map2(&px1, &p1, |px, p| safe_div(px, p).asin()))?;
        batch.add_column("Track_theta_y1", map2(&py1, &p1, |py, p| safe_div(py, p).asin()))?;

        let px0 = jagged(batch, "Track_pt0", "Track_px0")?.to_vec();
        let py0 = jagged(batch, "Track_pt0", "Track_py0")?.to_vec();
        let pt0_col = map2(&px0, &py0, |px, py| (px * px + py * py).sqrt());
        let pt0 = pt0_col.as_jagged()?.to_vec();
        batch.add_column("Track_pt0", pt0_col.clone())?;

        let theta0_col = map2(&pt0, &p0, |pt, p| safe_div(pt, p).asin());
        let theta0 = theta0_col.as_jagged()?.to_vec();
        batch.add_column("Track_theta0", theta0_col.clone())?;
        batch.add_column("Track_phi0", map2(&px0, &pt0, |px, pt| safe_div(px, pt).acos()))?;
        batch.add_column(
            "Track_eta0",
            Column::Jagged(
                theta0
                    .iter()
                    .map(|row| row.iter().map(|&t| -((t / 2.0).tan().ln())).collect())
                    .collect(),
            ),
        )?;

        let theta_x0_col = map2(&px0, &p0, |px, p| safe_div(px, p).asin());
        let theta_y0_col = map2(&py0, &p0, |py, p| safe_div(py, p).asin());
        let theta_x0 = theta_x0_col.as_jagged()?.to_vec();
        let theta_y0 = theta_y0_col.as_jagged()?.to_vec();
        batch.add_column("Track_theta_x0", theta_x0_col)?;
        batch.add_column("Track_theta_y0", theta_y0_col)?;

        // Charge-selected projections
        batch.add_column("Track_theta_x0_pos", select_where(&theta_x0, &charge, |q| q > 0.0))?;
        batch.add_column("Track_theta_x0_neg", select_where(&theta_x0, &charge, |q| q < 0.0))?;
        batch.add_column("Track_theta_y0_pos", select_where(&theta_y0, &charge, |q| q > 0.0))?;
        batch.add_column("Track_theta_y0_neg", select_where(&theta_y0, &charge, |q| q < 0.0))?;

        let x0 = jagged(batch, "Track_x0_pos", "Track_x0")?.to_vec();
        let y0 = jagged(batch, "Track_y0_pos", "Track_y0")?.to_vec();
        batch.add_column("Track_x0_pos", select_where(&x0, &charge, |q| q > 0.0))?;
        batch.add_column("Track_x0_neg", select_where(&x0, &charge, |q| q < 0.0))?;
        batch.add_column("Track_y0_pos", select_where(&y0, &charge, |q| q > 0.0))?;
        batch.add_column("Track_y0_neg", select_where(&y0, &charge, |q| q < 0.0))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tracks_batch() -> EventBatch {
        // Two events; the first has two tracks, the second one track.
        let j = |rows: Vec<Vec<f64>>| Column::Jagged(rows);
        EventBatch::new([
            ("Track_nLayers".to_string(), j(vec![vec![8.0, 6.0], vec![7.0]])),
            ("Track_charge".to_string(), j(vec![vec![1.0, -1.0], vec![-1.0]])),
            ("Track_nDoF".to_string(), j(vec![vec![10.0, 0.0], vec![8.0]])),
            ("Track_Chi2".to_string(), j(vec![vec![20.0, 3.0], vec![16.0]])),
            ("Track_pz0".to_string(), j(vec![vec![30_000.0, 25_000.0], vec![50_000.0]])),
            ("Track_p0".to_string(), j(vec![vec![30_001.0, 25_001.0], vec![50_002.0]])),
            ("Track_px0".to_string(), j(vec![vec![100.0, -50.0], vec![0.0]])),
            ("Track_py0".to_string(), j(vec![vec![50.0, 20.0], vec![200.0]])),
            ("Track_px1".to_string(), j(vec![vec![90.0, -40.0], vec![10.0]])),
            ("Track_py1".to_string(), j(vec![vec![45.0, 25.0], vec![190.0]])),
            ("Track_p1".to_string(), j(vec![vec![29_000.0, 24_000.0], vec![49_000.0]])),
            ("Track_x0".to_string(), j(vec![vec![1.0, 2.0], vec![3.0]])),
            ("Track_y0".to_string(), j(vec![vec![-1.0, -2.0], vec![-3.0]])),
        ])
        .unwrap()
    }

    #[test]
    fn multiplicities() {
        let mut b = tracks_batch();
        DerivedFieldEvaluator.augment(&mut b).unwrap();
        assert_eq!(b.scalar("NTracks").unwrap(), &[2.0, 1.0]);
        assert_eq!(b.scalar("NPosTracks").unwrap(), &[1.0, 0.0]);
        assert_eq!(b.scalar("NNegTracks").unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn zero_dof_gives_nan_not_error() {
        let mut b = tracks_batch();
        DerivedFieldEvaluator.augment(&mut b).unwrap();
        let chi2pd = b.column("Track_chi2_per_dof").unwrap().as_jagged().unwrap();
        assert_relative_eq!(chi2pd[0][0], 2.0);
        assert!(chi2pd[0][1].is_nan());
    }

    #[test]
    fn good_track_selection() {
        let mut b = tracks_batch();
        DerivedFieldEvaluator.augment(&mut b).unwrap();
        // Event 0: track 0 passes everything; track 1 fails layers and has
        // NaN chi2/dof. Event 1: track 0 passes.
        let good = b.column("GoodTracks").unwrap().as_jagged().unwrap();
        assert_eq!(good[0], vec![1.0, 0.0]);
        assert_eq!(good[1], vec![1.0]);
        assert_eq!(b.scalar("NGoodTracks").unwrap(), &[1.0, 1.0]);
        assert_eq!(b.scalar("NGoodPosTracks").unwrap(), &[1.0, 0.0]);
        assert_eq!(b.scalar("NGoodNegTracks").unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn duplicate_momentum_flagged() {
        let rows = vec![vec![5.0, 5.0, 6.0]];
        let flags = first_occurrence_flags(&rows);
        assert_eq!(flags[0], vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn angles_and_projections() {
        let mut b = tracks_batch();
        DerivedFieldEvaluator.augment(&mut b).unwrap();
        let theta_x0 = b.column("Track_theta_x0").unwrap().as_jagged().unwrap();
        assert_relative_eq!(theta_x0[0][0], (100.0f64 / 30_001.0).asin(), epsilon = 1e-12);

        let pos = b.column("Track_theta_x0_pos").unwrap().as_jagged().unwrap();
        assert_eq!(pos[0].len(), 1);
        assert_eq!(pos[1].len(), 0);
        let neg = b.column("Track_theta_x0_neg").unwrap().as_jagged().unwrap();
        assert_eq!(neg[0].len(), 1);
        assert_eq!(neg[1].len(), 1);
    }

    #[test]
    fn missing_input_reports_column() {
        let mut b = EventBatch::new([(
            "Track_charge".to_string(),
            Column::Jagged(vec![vec![1.0]]),
        )])
        .unwrap();
        let err = DerivedFieldEvaluator.augment(&mut b).unwrap_err();
        assert!(err.to_string().contains("Track_nLayers"));
    }
}
