//! Ordered cut pipeline with cumulative pass-count accounting.
//!
//! Stage `i` only sees the events that survived stages `0..i`: a failing
//! event is dropped for all later stages. The cutflow records cumulative
//! pass counts, one row per stage, in stage order; the sequence is
//! monotone non-increasing and bounded by the input size.

use dq_core::{CutflowEntry, Result};
use tracing::debug;

use crate::column::EventBatch;
use crate::expr::SelectionExpr;

/// One named boolean filter stage.
///
/// The predicate produces a keep-mask over a whole batch (bulk
/// evaluation; one bool per event).
pub struct CutStage {
    /// Stage name, shown in the cutflow report.
    pub name: String,
    predicate: Box<dyn Fn(&EventBatch) -> Result<Vec<bool>> + Send + Sync>,
}

impl CutStage {
    /// Create a stage from a mask-producing predicate.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&EventBatch) -> Result<Vec<bool>> + Send + Sync + 'static,
    ) -> Self {
        CutStage { name: name.into(), predicate: Box::new(predicate) }
    }

    /// Create a stage from a selection expression over scalar columns.
    pub fn from_expr(name: impl Into<String>, expression: &str) -> Result<Self> {
        let expr = SelectionExpr::parse(expression)?;
        Ok(CutStage::new(name, move |batch: &EventBatch| expr.eval_mask(batch)))
    }

    /// Evaluate the stage's keep-mask against a batch.
    pub fn mask(&self, batch: &EventBatch) -> Result<Vec<bool>> {
        (self.predicate)(batch)
    }
}

impl std::fmt::Debug for CutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutStage").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The ordered cutflow report produced by a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cutflow {
    input: usize,
    rows: Vec<CutflowEntry>,
}

impl Cutflow {
    /// Number of events fed into the pipeline.
    pub fn input_events(&self) -> usize {
        self.input
    }

    /// Cumulative pass counts, one per stage, in stage order.
    pub fn entries(&self) -> &[CutflowEntry] {
        &self.rows
    }

    /// Render the report in the classic one-line-per-stage form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut previous = self.input;
        for row in &self.rows {
            let pct = if previous == 0 {
                100.0
            } else {
                100.0 * row.passed as f64 / previous as f64
            };
            out.push_str(&format!(
                "{:<24} pass = {:>9}  ({:.1}% of previous)\n",
                row.stage, row.passed, pct
            ));
            previous = row.passed;
        }
        out
    }
}

/// Applies an ordered sequence of stages, AND-ing cumulatively.
#[derive(Debug, Default)]
pub struct CutPipeline {
    stages: Vec<CutStage>,
}

impl CutPipeline {
    /// Build a pipeline; stage order is fixed from here on.
    pub fn new(stages: Vec<CutStage>) -> Self {
        CutPipeline { stages }
    }

    /// Append a stage.
    pub fn push(&mut self, stage: CutStage) {
        self.stages.push(stage);
    }

    /// Stage names in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every stage over `batch`, returning the filtered view and the
    /// cutflow. A zero-event input yields all-zero counts, no error.
    pub fn apply(&self, batch: &EventBatch) -> Result<(EventBatch, Cutflow)> {
        let mut current = batch.clone();
        let mut cutflow = Cutflow { input: batch.n_events(), rows: Vec::new() };

        for stage in &self.stages {
            let mask = stage.mask(&current)?;
            current = current.filtered(&mask)?;
            debug!(stage = %stage.name, passed = current.n_events(), "cut applied");
            cutflow
                .rows
                .push(CutflowEntry { stage: stage.name.clone(), passed: current.n_events() });
        }

        Ok((current, cutflow))
    }
}

/// The detector-quality stages applied after the time-window cuts.
///
/// Matches the standard run-certification selection: no timing-counter
/// saturation, colliding bunches only, and the timing trigger fired.
pub fn detector_stages() -> Result<Vec<CutStage>> {
    Ok(vec![
        CutStage::from_expr(
            "No timing saturation",
            "bitand(Timing0_status, 4) == 0 && bitand(Timing1_status, 4) == 0 && \
             bitand(Timing2_status, 4) == 0 && bitand(Timing3_status, 4) == 0",
        )?,
        CutStage::from_expr("Colliding", "distanceToCollidingBCID == 0")?,
        CutStage::from_expr("Timing trigger", "bitand(TAP, 4) != 0")?,
    ])
}
