//! `rundq merge`: combine yield histograms across per-run artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use dq_core::Histogram;
use dq_engine::{merge_artifacts, MergePolicy};

#[derive(Debug, Serialize)]
struct CombinedYields {
    sources: Vec<PathBuf>,
    yields: Vec<Histogram>,
}

pub fn cmd_merge(inputs: &[PathBuf], output: &Path, policy: MergePolicy) -> Result<()> {
    let yields = merge_artifacts(inputs, policy)?;

    let combined = CombinedYields { sources: inputs.to_vec(), yields };
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output, serde_json::to_string_pretty(&combined)?)?;

    info!(
        inputs = inputs.len(),
        yields = combined.yields.len(),
        output = %output.display(),
        "combined yields written"
    );
    println!("Combined {} yield histogram(s) from {} file(s) into {}",
        combined.yields.len(),
        inputs.len(),
        output.display()
    );
    Ok(())
}
