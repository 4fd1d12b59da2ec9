//! # dq-core
//!
//! Shared error and value types for RunDQ: the error enum used across the
//! workspace, the histogram/cutflow value types, and the persisted per-run
//! artifact record.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CutflowEntry, Histogram, RunArtifact};
