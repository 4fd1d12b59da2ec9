//! Persisted per-run artifacts and the cross-file merge entry point.
//!
//! One JSON file per run holds the kinematic histograms, the yield
//! histograms, and the `{run, luminosity}` metadata record. The merge
//! entry point groups yield histograms by name across files and unifies
//! each group's run axis.

use std::fs;
use std::path::Path;

use dq_core::{Error, Histogram, Result, RunArtifact};
use tracing::info;

use crate::merge::{merge_run_histograms, MergePolicy, RunHistogramSet};

/// Write a run artifact as pretty JSON.
pub fn write_run_artifact(path: &Path, artifact: &RunArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(artifact)?;
    fs::write(path, json)?;
    info!(path = %path.display(), run = artifact.run, "artifact written");
    Ok(())
}

/// Read a run artifact back, validating that it carries yield histograms.
pub fn read_run_artifact(path: &Path) -> Result<RunArtifact> {
    let text = fs::read_to_string(path)?;
    let artifact: RunArtifact = serde_json::from_str(&text)?;
    if artifact.yields.is_empty() {
        return Err(Error::Artifact(format!(
            "{} has no yield histograms",
            path.display()
        )));
    }
    Ok(artifact)
}

/// Merge the yield histograms of several per-run artifacts.
///
/// Groups yields by name across the input files (name order follows the
/// first file) and merges each group per the run-axis algorithm. Every
/// input must provide every yield name of the first file.
pub fn merge_artifacts(paths: &[impl AsRef<Path>], policy: MergePolicy) -> Result<Vec<Histogram>> {
    let mut groups: Vec<(String, Vec<RunHistogramSet>)> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let artifact = read_run_artifact(path)?;
        for histogram in artifact.yields {
            let source = path.display().to_string();
            match groups.iter_mut().find(|(name, _)| *name == histogram.name) {
                Some((_, sets)) => sets.push(RunHistogramSet { source, histogram }),
                None => {
                    groups.push((
                        histogram.name.clone(),
                        vec![RunHistogramSet { source, histogram }],
                    ));
                }
            }
        }
    }
    if groups.is_empty() {
        return Err(Error::Artifact("no input artifacts to merge".into()));
    }

    let n_inputs = paths.len();
    for (name, sets) in &groups {
        if sets.len() != n_inputs {
            return Err(Error::Artifact(format!(
                "yield '{}' present in {} of {} input files",
                name,
                sets.len(),
                n_inputs
            )));
        }
    }

    info!(yields = groups.len(), files = n_inputs, "merging yield histograms");
    groups.iter().map(|(_, sets)| merge_run_histograms(sets, policy)).collect()
}
