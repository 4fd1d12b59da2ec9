//! Good-run-list directory loading: interval JSON files and luminosity
//! CSV tables.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dq_core::{Error, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::intervals::IntervalIndex;

/// One `[start, stop]` time window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IntervalWindow {
    /// Window start (unix time).
    pub start_utime: i64,
    /// Window stop (unix time).
    pub stop_utime: i64,
}

#[derive(Debug, Deserialize)]
struct RunIntervals {
    stable_list: Vec<IntervalWindow>,
    #[serde(default)]
    excluded_list: Vec<IntervalWindow>,
}

/// Run-quality information for a data-taking period: per-run stable and
/// excluded windows plus recorded luminosity.
#[derive(Debug, Clone)]
pub struct GrlProvider {
    intervals: IntervalIndex,
    luminosity: HashMap<u32, f64>,
}

/// Recorded luminosity lives in this 0-indexed CSV column.
const LUMI_COLUMN: usize = 3;

/// The CSV tables carry pb^-1; everything downstream uses fb^-1.
const PB_TO_FB: f64 = 1e-3;

fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<std::path::PathBuf>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();
    paths.sort();
    Ok(paths)
}

impl GrlProvider {
    /// Load every interval `.json` and luminosity `.csv` file in `dir`.
    ///
    /// Fails with `MissingIntervalData` when either file kind is entirely
    /// absent; run-quality information is mandatory.
    pub fn load(dir: &Path) -> Result<Self> {
        let json_paths = files_with_extension(dir, "json")?;
        if json_paths.is_empty() {
            return Err(Error::MissingIntervalData(format!(
                "no interval .json files in {}",
                dir.display()
            )));
        }
        let csv_paths = files_with_extension(dir, "csv")?;
        if csv_paths.is_empty() {
            return Err(Error::MissingIntervalData(format!(
                "no luminosity .csv files in {}",
                dir.display()
            )));
        }

        let mut stable = HashMap::new();
        let mut excluded = HashMap::new();
        for path in &json_paths {
            let text = fs::read_to_string(path)?;
            let runs: HashMap<String, RunIntervals> = serde_json::from_str(&text)?;
            for (run_text, info) in runs {
                let run: u32 = run_text.parse().map_err(|_| {
                    Error::MissingIntervalData(format!(
                        "bad run number '{run_text}' in {}",
                        path.display()
                    ))
                })?;
                if !info.excluded_list.is_empty() {
                    debug!(run, n = info.excluded_list.len(), "excluded windows");
                }
                stable.entry(run).or_insert_with(Vec::new).extend(info.stable_list);
                excluded.entry(run).or_insert_with(Vec::new).extend(info.excluded_list);
            }
        }

        let mut luminosity = HashMap::new();
        for path in &csv_paths {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .comment(Some(b'#'))
                .flexible(true)
                .from_path(path)?;
            for record in reader.records() {
                let record = record?;
                let (Some(run_text), Some(lumi_text)) = (record.get(0), record.get(LUMI_COLUMN))
                else {
                    continue;
                };
                let (Ok(run), Ok(lumi_pb)) = (run_text.parse::<u32>(), lumi_text.parse::<f64>())
                else {
                    continue;
                };
                luminosity.insert(run, lumi_pb * PB_TO_FB);
            }
        }

        let index = IntervalIndex::new(stable, excluded);
        info!(
            runs = luminosity.len(),
            excluded_windows = index.n_excluded_windows(),
            "good-run lists loaded"
        );
        Ok(GrlProvider { intervals: index, luminosity })
    }

    /// The per-run time-window containment index.
    pub fn intervals(&self) -> &IntervalIndex {
        &self.intervals
    }

    /// Recorded luminosity for `run` in fb^-1, if listed.
    pub fn luminosity(&self, run: u32) -> Option<f64> {
        self.luminosity.get(&run).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_grl(dir: &Path) {
        let mut json = fs::File::create(dir.join("grl_2024.json")).unwrap();
        write!(
            json,
            r#"{{
                "16000": {{
                    "stable_list": [{{"start_utime": 100, "stop_utime": 200}}],
                    "excluded_list": [{{"start_utime": 150, "stop_utime": 160}}]
                }},
                "16001": {{
                    "stable_list": [{{"start_utime": 300, "stop_utime": 400}}]
                }}
            }}"#
        )
        .unwrap();

        let mut csv = fs::File::create(dir.join("lumi_2024.csv")).unwrap();
        writeln!(csv, "run,start,stop,lumi_rec").unwrap();
        writeln!(csv, "# comment line").unwrap();
        writeln!(csv, "16000,0,0,1234.5").unwrap();
        writeln!(csv, "16001,0,0,50.0").unwrap();
    }

    #[test]
    fn loads_intervals_and_lumi() {
        let dir = tempfile::tempdir().unwrap();
        write_grl(dir.path());
        let grl = GrlProvider::load(dir.path()).unwrap();

        assert!(grl.intervals().is_stable(16000, 100));
        assert!(grl.intervals().is_excluded(16000, 155));
        assert!(!grl.intervals().is_excluded(16001, 350));
        assert_relative_eq!(grl.luminosity(16000).unwrap(), 1.2345);
        assert_relative_eq!(grl.luminosity(16001).unwrap(), 0.05);
        assert!(grl.luminosity(99999).is_none());
    }

    #[test]
    fn missing_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lumi.csv"), "run,a,b,lumi\n1,0,0,1.0\n").unwrap();
        let err = GrlProvider::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingIntervalData(_)));
    }

    #[test]
    fn missing_csv_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("grl.json"), "{}").unwrap();
        let err = GrlProvider::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingIntervalData(_)));
    }
}
