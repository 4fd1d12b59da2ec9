//! `rundq book` orchestration: one artifact per run, runs isolated.

use std::path::Path;

use anyhow::Result;
use tracing::{error, info};

use dq_core::RunArtifact;
use dq_engine::{
    book_histograms, detector_stages, read_event_batch, run_weight, write_run_artifact,
    yield_specs, CutPipeline, DerivedFieldEvaluator, GrlProvider, HistogramSpec, SchemaResolver,
};

/// Book every requested run; a failing run is skipped and reported, the
/// rest continue. Exits non-zero when any run was skipped so partial
/// success is never silent.
pub fn cmd_book(
    events_dir: &Path,
    grl_dir: &Path,
    specs_dir: &Path,
    out_dir: &Path,
    runs: &[u32],
) -> Result<()> {
    // Run-quality data and specs are mandatory for every run: fail now.
    let grl = GrlProvider::load(grl_dir)?;
    let specs = dq_engine::load_spec_fragments(specs_dir)?;
    let resolver = SchemaResolver::standard();

    let mut skipped: Vec<(u32, String)> = Vec::new();
    for &run in runs {
        match book_run(events_dir, &grl, &resolver, &specs, run) {
            Ok((artifact, report)) => {
                let path = out_dir.join(format!("{run}.json"));
                println!("Cutflow report for run {run}:\n{report}");
                if let Err(e) = write_run_artifact(&path, &artifact) {
                    error!(run, error = %e, "failed to write artifact");
                    skipped.push((run, e.to_string()));
                } else {
                    info!(run, path = %path.display(), "run booked");
                }
            }
            Err(e) => {
                error!(run, error = %e, "run skipped");
                skipped.push((run, e.to_string()));
            }
        }
    }

    let booked = runs.len() - skipped.len();
    println!("Booked {booked} of {} run(s)", runs.len());
    if !skipped.is_empty() {
        for (run, reason) in &skipped {
            println!("  skipped run {run}: {reason}");
        }
        anyhow::bail!("{} run(s) skipped", skipped.len());
    }
    Ok(())
}

fn book_run(
    events_dir: &Path,
    grl: &GrlProvider,
    resolver: &SchemaResolver,
    specs: &[HistogramSpec],
    run: u32,
) -> dq_core::Result<(RunArtifact, String)> {
    let mut batch = read_event_batch(&events_dir.join(format!("{run}.json")))?;

    resolver.resolve(run, &mut batch);
    DerivedFieldEvaluator.augment(&mut batch)?;

    let mut stages = grl.intervals().time_stages();
    stages.extend(detector_stages()?);
    let (filtered, cutflow) = CutPipeline::new(stages).apply(&batch)?;

    let luminosity = grl.luminosity(run);
    let weight = run_weight(run, luminosity, filtered.n_events());
    let kinematic = book_histograms(&filtered, specs, weight)?;
    let yields = book_histograms(&filtered, &yield_specs(run), 1.0)?;

    let mut report = cutflow.render();
    for row in &kinematic.local_cutflow {
        report.push_str(&format!("{:<24} pass = {:>9}  (local)\n", row.stage, row.passed));
    }

    Ok((
        RunArtifact {
            run,
            luminosity,
            histograms: kinematic.histograms,
            yields: yields.histograms,
        },
        report,
    ))
}
