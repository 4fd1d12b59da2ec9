//! Declarative histogram-spec loading from a directory of YAML fragments.
//!
//! Fragments are read in lexicographic filename order and merged into one
//! spec table. On a name collision the later fragment overrides the
//! earlier one; this is policy, and every override is logged.

use std::fs;
use std::path::Path;

use dq_core::{Error, Result};
use tracing::{info, warn};

use crate::booking::HistogramSpec;

/// Load and merge every `*.yaml`/`*.yml` fragment in `dir`.
///
/// Each fragment is a YAML list of spec entries. Every entry is validated
/// (`nbins >= 1`, `min < max`) at load time so a broken fragment fails
/// before any booking starts. Returns the merged specs in first-seen name
/// order.
pub fn load_spec_fragments(dir: &Path) -> Result<Vec<HistogramSpec>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(Error::InvalidSpec(format!(
            "no histogram spec fragments (*.yaml) in {}",
            dir.display()
        )));
    }

    let mut merged: Vec<HistogramSpec> = Vec::new();
    for path in &paths {
        let text = fs::read_to_string(path)?;
        let fragment: Vec<HistogramSpec> = serde_yaml_ng::from_str(&text)?;
        for spec in fragment {
            spec.validate().map_err(|e| {
                Error::InvalidSpec(format!("{} in {}", e, path.display()))
            })?;
            match merged.iter_mut().find(|s| s.name == spec.name) {
                Some(existing) => {
                    warn!(
                        spec = %spec.name,
                        fragment = %path.display(),
                        "spec overridden by later fragment"
                    );
                    *existing = spec;
                }
                None => merged.push(spec),
            }
        }
    }

    info!(specs = merged.len(), fragments = paths.len(), "histogram specs loaded");
    Ok(merged)
}
