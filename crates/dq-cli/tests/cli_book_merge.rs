use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rundq"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("rundq_cli_{}_{}_{}", std::process::id(), nanos, name));
    fs::create_dir_all(&p).unwrap();
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn write_event_file(dir: &Path, run: u32) {
    let jag = |rows: Vec<Vec<f64>>| json!(rows);
    let payload = json!({
        "columns": {
            "run": [run, run, run],
            "eventTime": [1010.0, 1150.0, 1200.0],
            "Timing0_status": [0.0, 0.0, 0.0],
            "Timing1_status": [0.0, 0.0, 0.0],
            "Timing2_status": [0.0, 0.0, 0.0],
            "Timing3_status": [0.0, 0.0, 0.0],
            "distanceToCollidingBCID": [0.0, 0.0, 0.0],
            "TAP": [4.0, 4.0, 4.0],
            "Veto10_charge": [40.0, 50.0, 60.0],
            "Track_nLayers": jag(vec![vec![8.0], vec![], vec![8.0]]),
            "Track_charge": jag(vec![vec![1.0], vec![], vec![-1.0]]),
            "Track_nDoF": jag(vec![vec![10.0], vec![], vec![9.0]]),
            "Track_Chi2": jag(vec![vec![10.0], vec![], vec![9.0]]),
            "Track_pz0": jag(vec![vec![30000.0], vec![], vec![40000.0]]),
            "Track_p0": jag(vec![vec![30000.0], vec![], vec![40000.0]]),
            "Track_px0": jag(vec![vec![100.0], vec![], vec![120.0]]),
            "Track_py0": jag(vec![vec![50.0], vec![], vec![60.0]]),
            "Track_px1": jag(vec![vec![100.0], vec![], vec![120.0]]),
            "Track_py1": jag(vec![vec![50.0], vec![], vec![60.0]]),
            "Track_p1": jag(vec![vec![30000.0], vec![], vec![40000.0]]),
            "Track_x0": jag(vec![vec![1.0], vec![], vec![2.0]]),
            "Track_y0": jag(vec![vec![1.0], vec![], vec![2.0]]),
        }
    });
    fs::write(dir.join(format!("{run}.json")), payload.to_string()).unwrap();
}

fn write_grl(dir: &Path, runs: &[u32]) {
    let mut grl = serde_json::Map::new();
    for &run in runs {
        grl.insert(
            run.to_string(),
            json!({"stable_list": [{"start_utime": 1000, "stop_utime": 1400}]}),
        );
    }
    fs::write(dir.join("grl.json"), serde_json::Value::Object(grl).to_string()).unwrap();
    let mut csv = String::from("run,start,stop,lumi_rec\n");
    for &run in runs {
        csv.push_str(&format!("{run},0,0,1000.0\n"));
    }
    fs::write(dir.join("lumi.csv"), csv).unwrap();
}

fn write_specs(dir: &Path) {
    fs::write(
        dir.join("10_dq.yaml"),
        "- name: Track_Chi2\n  nbins: 50\n  min: 0.0\n  max: 50.0\n\
         - name: VetoSt10_charge\n  nbins: 50\n  min: 0.01\n  max: 300.0\n",
    )
    .unwrap();
}

fn setup(runs: &[u32]) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let events = tmp_dir("events");
    let grl = tmp_dir("grl");
    let specs = tmp_dir("specs");
    let out = tmp_dir("out");
    for &run in runs {
        write_event_file(&events, run);
    }
    write_grl(&grl, runs);
    write_specs(&specs);
    (events, grl, specs, out)
}

#[test]
fn book_then_merge_end_to_end() {
    let runs = [16000u32, 16002u32];
    let (events, grl, specs, out) = setup(&runs);

    let output = run(&[
        "book",
        "--events-dir",
        events.to_str().unwrap(),
        "--grl-dir",
        grl.to_str().unwrap(),
        "--specs-dir",
        specs.to_str().unwrap(),
        "--out-dir",
        out.to_str().unwrap(),
        "16000",
        "16002",
    ]);
    assert!(
        output.status.success(),
        "book should succeed, stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cutflow report for run 16000"));
    assert!(stdout.contains("Good times"));
    assert!(stdout.contains("Booked 2 of 2 run(s)"));

    let artifact_a = out.join("16000.json");
    let artifact_b = out.join("16002.json");
    assert!(artifact_a.exists());
    assert!(artifact_b.exists());

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact_a).unwrap()).unwrap();
    assert_eq!(parsed["run"], 16000);
    // 1000 pb^-1 -> 1 fb^-1
    assert_eq!(parsed["luminosity"], 1.0);

    let combined = out.join("combined.json");
    let output = run(&[
        "merge",
        "--output",
        combined.to_str().unwrap(),
        "--policy",
        "overwrite",
        artifact_a.to_str().unwrap(),
        artifact_b.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "merge should succeed, stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&combined).unwrap()).unwrap();
    let yields = parsed["yields"].as_array().unwrap();
    let yield_hist = yields
        .iter()
        .find(|h| h["name"] == "Yield")
        .expect("merged output should carry the Yield histogram");
    // Union range [16000, 16003): run 16001 was never booked and stays zero.
    assert_eq!(yield_hist["bin_edges"].as_array().unwrap().len(), 4);
    let counts: Vec<f64> = yield_hist["bin_counts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(counts, vec![3.0, 0.0, 3.0]);
}

#[test]
fn missing_event_file_skips_run_and_exits_nonzero() {
    let runs = [16000u32];
    let (events, grl, specs, out) = setup(&runs);

    let output = run(&[
        "book",
        "--events-dir",
        events.to_str().unwrap(),
        "--grl-dir",
        grl.to_str().unwrap(),
        "--specs-dir",
        specs.to_str().unwrap(),
        "--out-dir",
        out.to_str().unwrap(),
        "16000",
        "17777",
    ]);
    assert!(!output.status.success(), "partial success must exit non-zero");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Booked 1 of 2 run(s)"));
    assert!(stdout.contains("skipped run 17777"));
    // The good run was still booked.
    assert!(out.join("16000.json").exists());
    assert!(!out.join("17777.json").exists());
}

#[test]
fn empty_grl_dir_is_fatal_before_any_booking() {
    let (events, _grl, specs, out) = setup(&[16000]);
    let empty_grl = tmp_dir("empty_grl");

    let output = run(&[
        "book",
        "--events-dir",
        events.to_str().unwrap(),
        "--grl-dir",
        empty_grl.to_str().unwrap(),
        "--specs-dir",
        specs.to_str().unwrap(),
        "--out-dir",
        out.to_str().unwrap(),
        "16000",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing run-quality data"));
    assert!(!out.join("16000.json").exists());
}
