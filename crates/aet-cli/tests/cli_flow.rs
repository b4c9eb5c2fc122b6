//! End-to-end tests for the `aet` binary.
//!
//! Each test writes TCX fixtures to a temp directory and checks stdout,
//! stderr and the exit status.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn aet_binary() -> String {
    env!("CARGO_BIN_EXE_aet").to_string()
}

/// Runs `aet` isolated from the user's config and environment.
fn run_aet(home: &Path, args: &[&str]) -> Output {
    Command::new(aet_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("AET_ZONES")
        .env_remove("AET_TREADMILL_PACE")
        .env_remove("AET_LOCAL_TIME")
        .env_remove("AET_TIMEZONE")
        .env_remove("AET_HEADERS")
        .env_remove("AET_PARALLEL")
        .args(args)
        .output()
        .expect("failed to run aet")
}

/// Two laps: a steady 10 s lap (3 m/s, 120 then 132 bpm) and an empty lap.
fn two_lap_tcx() -> String {
    let mut points = String::new();
    for i in 0..10 {
        let bpm = if i < 5 { 120 } else { 132 };
        points.push_str(&format!(
            r"<Trackpoint>
              <Time>2020-06-13T13:00:{i:02}.000Z</Time>
              <DistanceMeters>{}.0</DistanceMeters>
              <HeartRateBpm><Value>{bpm}</Value></HeartRateBpm>
            </Trackpoint>",
            i * 3
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Running">
      <Lap StartTime="2020-06-13T13:00:00.000Z">
        <TotalTimeSeconds>10</TotalTimeSeconds>
        <DistanceMeters>27</DistanceMeters>
        <Track>{points}</Track>
      </Lap>
      <Lap StartTime="2020-06-13T13:00:10.000Z">
        <TotalTimeSeconds>0</TotalTimeSeconds>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>
"#
    )
}

struct Fixtures {
    temp: TempDir,
    valid: PathBuf,
    missing: PathBuf,
    corrupt: PathBuf,
}

impl Fixtures {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let valid = temp.path().join("valid.tcx");
        let missing = temp.path().join("missing.tcx");
        let corrupt = temp.path().join("corrupt.tcx");
        fs::write(&valid, two_lap_tcx()).unwrap();
        fs::write(&corrupt, "<TrainingCenterDatabase><Activities>").unwrap();
        Self {
            temp,
            valid,
            missing,
            corrupt,
        }
    }

    fn home(&self) -> &Path {
        self.temp.path()
    }
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn drift_reports_each_lap_in_order() {
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["drift", "-c", path(&fx.valid)]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "Source,Start,End,Duration,Drift\n\
         valid.tcx,2020-06-13 13:00:00+00:00,2020-06-13 13:00:09+00:00,0:00:09,0.1364\n\
         valid.tcx,,,,\n"
    );
}

#[test]
fn skipped_sources_are_reported_and_classified() {
    let fx = Fixtures::new();
    let output = run_aet(
        fx.home(),
        &[
            "-v",
            "drift",
            path(&fx.valid),
            path(&fx.missing),
            path(&fx.corrupt),
        ],
    );

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2, "two laps of the valid file: {stdout}");
    assert!(stdout.lines().all(|line| line.starts_with("valid.tcx,")));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Processed 1 of 3 sources"), "{stderr}");
    assert!(stderr.contains("missing.tcx: source unavailable"), "{stderr}");
    assert!(stderr.contains("corrupt.tcx: parse error"), "{stderr}");
    assert!(stderr.contains("lap 2: lap has no trackpoints"), "{stderr}");
    assert!(stderr.contains("Result: partial failure"), "{stderr}");
}

#[test]
fn nothing_usable_is_total_failure() {
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["drift", path(&fx.missing), path(&fx.corrupt)]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn status_report_needs_verbosity() {
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["drift", path(&fx.valid)]);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("Processed"), "{stderr}");
}

#[test]
fn treadmill_drift_reflects_heart_rate_only() {
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["drift", "-t", "9", path(&fx.valid)]);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let first = stdout.lines().next().unwrap();
    assert!(first.ends_with(",-0.0909"), "{first}");
}

#[test]
fn zones_table_with_overall_row() {
    let fx = Fixtures::new();
    let output = run_aet(
        fx.home(),
        &["zones", "-c", "-z", "0,100,125,200", path(&fx.valid), path(&fx.valid)],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "Source,Z0,Z1,Z2,Samples,Out of Range\n\
         valid.tcx,0.000000,0.500000,0.500000,10,0\n\
         valid.tcx,0.000000,0.500000,0.500000,10,0\n\
         Overall,0.000000,0.500000,0.500000,20,0\n"
    );
}

#[test]
fn invalid_zones_fail_before_reading_files() {
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["zones", "-z", "100", path(&fx.valid)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("zones need at least 2 boundaries"), "{stderr}");
}

#[test]
fn config_file_supplies_defaults() {
    let fx = Fixtures::new();
    let config = fx.home().join("aet.toml");
    fs::write(&config, "zones = \"0,140,200\"\nheaders = true\n").unwrap();

    let output = run_aet(
        fx.home(),
        &["--config", path(&config), "zones", path(&fx.valid)],
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Source,Z0,Z1,Samples"), "{stdout}");
    assert!(stdout.contains("valid.tcx,1.000000,0.000000,10,0"), "{stdout}");
}

#[test]
fn json_output_carries_report() {
    let fx = Fixtures::new();
    let output = run_aet(
        fx.home(),
        &["drift", "--format", "json", path(&fx.valid), path(&fx.missing)],
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["laps"].as_array().unwrap().len(), 2);
    assert_eq!(json["laps"][1]["hazard"], "no_trackpoints");
    let sources = json["report"]["sources"].as_array().unwrap();
    assert_eq!(sources[0]["status"], "processed");
    assert_eq!(sources[1]["status"], "skipped");
    assert_eq!(sources[1]["reason"], "source_unavailable");
}

#[test]
fn local_time_without_lookup_is_degraded_once() {
    if cfg!(feature = "geo-tz") {
        return;
    }
    let fx = Fixtures::new();
    let output = run_aet(fx.home(), &["-v", "drift", "-l", path(&fx.valid)]);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("+00:00"), "{stdout}");
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(
        stderr.matches("no timezone lookup available").count(),
        1,
        "{stderr}"
    );
    assert!(stderr.contains("Local time unavailable"), "{stderr}");
}

#[test]
fn parallel_output_matches_sequential() {
    let fx = Fixtures::new();
    let copies: Vec<PathBuf> = (0..6)
        .map(|i| {
            let copy = fx.home().join(format!("run{i}.tcx"));
            fs::copy(&fx.valid, &copy).unwrap();
            copy
        })
        .collect();
    let mut args = vec!["drift"];
    args.extend(copies.iter().map(|p| path(p)));

    let sequential = run_aet(fx.home(), &args);
    args.push("--parallel");
    let parallel = run_aet(fx.home(), &args);

    assert_eq!(sequential.stdout, parallel.stdout);
    let names: Vec<String> = String::from_utf8(parallel.stdout)
        .unwrap()
        .lines()
        .map(|line| line.split(',').next().unwrap().to_string())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("run0.tcx"));
    assert_eq!(names.last().map(String::as_str), Some("run5.tcx"));
}
