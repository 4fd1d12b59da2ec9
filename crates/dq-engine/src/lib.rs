//! # dq-engine
//!
//! The RunDQ algorithmic core: per-run event filtering, declarative
//! histogram booking, and run-number-axis histogram merging.
//!
//! Per-run data flows through the modules in order: a columnar
//! [`EventBatch`] is read, era-dependent field names are resolved onto the
//! canonical schema ([`SchemaResolver`]), secondary quantities are computed
//! ([`DerivedFieldEvaluator`]), the ordered cut pipeline filters the batch
//! ([`CutPipeline`], with time-window stages from [`IntervalIndex`]), and
//! the booking engine evaluates declarative [`HistogramSpec`]s against the
//! surviving events. Independently produced run-indexed histograms are
//! later combined by the [`merge`] module.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod booking;
pub mod column;
pub mod cuts;
pub mod derive;
pub mod events;
pub mod expr;
pub mod grl;
pub mod intervals;
pub mod merge;
pub mod schema;
pub mod specs;
pub mod yields;

pub use artifact::{merge_artifacts, read_run_artifact, write_run_artifact};
pub use booking::{book_histograms, run_weight, BookingOutput, HistogramSpec, LocalCut};
pub use column::{Column, EventBatch};
pub use cuts::{detector_stages, CutPipeline, CutStage, Cutflow};
pub use derive::DerivedFieldEvaluator;
pub use events::read_event_batch;
pub use expr::SelectionExpr;
pub use grl::{GrlProvider, IntervalWindow};
pub use intervals::IntervalIndex;
pub use merge::{merge_run_histograms, MergePolicy, RunHistogramSet};
pub use schema::{Era, SchemaResolver};
pub use specs::load_spec_fragments;
pub use yields::yield_specs;
