//! Per-run time-window containment tests and the two time-quality cuts.
//!
//! Replaces the OR-of-conditions filter strings the run lists used to be
//! turned into: windows are held as per-run sorted lists and containment
//! is a bounded scan, independent of how many runs are loaded.

use std::collections::HashMap;

use crate::column::EventBatch;
use crate::cuts::CutStage;
use crate::grl::IntervalWindow;

/// Per-run stable and excluded time windows with containment tests.
///
/// Window bounds are inclusive on both ends: an event exactly on a
/// boundary is inside the window.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    stable: HashMap<u32, Vec<IntervalWindow>>,
    excluded: HashMap<u32, Vec<IntervalWindow>>,
}

fn contains(windows: Option<&Vec<IntervalWindow>>, t: i64) -> bool {
    windows
        .map(|ws| ws.iter().any(|w| t >= w.start_utime && t <= w.stop_utime))
        .unwrap_or(false)
}

impl IntervalIndex {
    /// Build an index from per-run stable and excluded window lists.
    pub fn new(
        stable: HashMap<u32, Vec<IntervalWindow>>,
        excluded: HashMap<u32, Vec<IntervalWindow>>,
    ) -> Self {
        let mut index = IntervalIndex { stable, excluded };
        for windows in index.stable.values_mut().chain(index.excluded.values_mut()) {
            windows.sort_by_key(|w| w.start_utime);
        }
        index
    }

    /// Whether `t` lies in a stable window of `run`.
    pub fn is_stable(&self, run: u32, t: i64) -> bool {
        contains(self.stable.get(&run), t)
    }

    /// Whether `t` lies in an excluded window of `run`.
    pub fn is_excluded(&self, run: u32, t: i64) -> bool {
        contains(self.excluded.get(&run), t)
    }

    /// Total number of excluded windows across all runs.
    pub fn n_excluded_windows(&self) -> usize {
        self.excluded.values().map(|w| w.len()).sum()
    }

    /// The time-quality cut stages for the pipeline.
    ///
    /// Always produces the "Good times" stage; the "Excluded times" stage
    /// is omitted when no run has any excluded window.
    pub fn time_stages(&self) -> Vec<CutStage> {
        let mut stages = Vec::with_capacity(2);

        let stable = self.clone();
        stages.push(CutStage::new("Good times", move |batch: &EventBatch| {
            let runs = batch.scalar("run")?;
            let times = batch.scalar("eventTime")?;
            Ok(runs
                .iter()
                .zip(times)
                .map(|(&r, &t)| stable.is_stable(r as u32, t as i64))
                .collect())
        }));

        if self.n_excluded_windows() > 0 {
            let excluded = self.clone();
            stages.push(CutStage::new("Excluded times", move |batch: &EventBatch| {
                let runs = batch.scalar("run")?;
                let times = batch.scalar("eventTime")?;
                Ok(runs
                    .iter()
                    .zip(times)
                    .map(|(&r, &t)| !excluded.is_excluded(r as u32, t as i64))
                    .collect())
            }));
        }

        stages
    }
}
