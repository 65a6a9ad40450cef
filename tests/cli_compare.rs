use predicates::str::{contains, diff};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn write_temp_file(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!("sched-dash-{}-{}.{}", nanos, seq, extension));
    fs::write(&path, contents).expect("temp write should succeed");
    path
}

const RUNS: &str = r#"[
  {
    "algorithm": "fcfs",
    "results": [{ "id": "p1", "name": "A", "burstTime": 5, "remainingTime": 0 }],
    "statistics": {
      "totalProcesses": 3, "totalTime": 12, "cpuUtilization": "91.67",
      "avgWaitingTime": "4.33", "avgTurnaroundTime": "8.33",
      "avgResponseTime": "4.33", "throughput": "0.25"
    }
  },
  {
    "algorithm": "sjf",
    "results": [{ "id": "p1", "name": "A", "burstTime": 5, "remainingTime": 0 }],
    "statistics": {
      "totalProcesses": 3, "totalTime": 12, "cpuUtilization": "91.67",
      "avgWaitingTime": "3.00", "avgTurnaroundTime": "7.00",
      "avgResponseTime": "3.00", "throughput": "0.25"
    }
  },
  {
    "algorithm": "round-robin",
    "results": [{ "id": "p1", "name": "A", "burstTime": 5, "remainingTime": 0 }],
    "statistics": {
      "totalProcesses": 3, "totalTime": 12, "cpuUtilization": "91.67",
      "avgWaitingTime": "5.67", "avgTurnaroundTime": "9.67",
      "avgResponseTime": "1.00", "throughput": "0.25"
    }
  }
]"#;

#[test]
fn compare_human_prints_full_report() {
    let path = write_temp_file(RUNS, "json");
    let expected = concat!(
        "Runs: 3\n",
        "Metrics:\n",
        "fcfs: cpu-utilization=91.67 avg-waiting-time=4.33 avg-turnaround-time=8.33 avg-response-time=4.33 throughput=0.25\n",
        "sjf: cpu-utilization=91.67 avg-waiting-time=3.00 avg-turnaround-time=7.00 avg-response-time=3.00 throughput=0.25\n",
        "round-robin: cpu-utilization=91.67 avg-waiting-time=5.67 avg-turnaround-time=9.67 avg-response-time=1.00 throughput=0.25\n",
        "Best:\n",
        "cpu-utilization: fcfs (91.67)\n",
        "avg-waiting-time: sjf (3.00)\n",
        "avg-turnaround-time: sjf (7.00)\n",
        "avg-response-time: round-robin (1.00)\n",
        "throughput: fcfs (0.25)\n",
        "Ranking:\n",
        "1. sjf: 2.40 (47.99%)\n",
        "2. fcfs: 1.00 (20.07%)\n",
        "3. round-robin: 1.00 (20.00%)\n",
        "Winner: sjf\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap()]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn compare_summary_with_weight_override() {
    let path = write_temp_file(RUNS, "json");
    let expected = concat!(
        "Ranking:\n",
        "1. sjf (50.00%)\n",
        "2. fcfs (25.09%)\n",
        "3. round-robin (0.00%)\n",
        "Winner: sjf\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args([
        "compare",
        "--runs",
        path.to_str().unwrap(),
        "--format",
        "summary",
        "--weight",
        "avg-response-time=0",
    ]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn compare_weights_from_toml_config() {
    let runs = write_temp_file(RUNS, "json");
    let config = write_temp_file(
        "[analytics.weights]\n\"avg-response-time\" = 0.0\n",
        "toml",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args([
        "compare",
        "--runs",
        runs.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--format",
        "summary",
    ]);
    cmd.assert()
        .success()
        .stdout(contains("2. fcfs (25.09%)"));
}

#[test]
fn compare_chart_scales_throughput() {
    let path = write_temp_file(RUNS, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap(), "--chart"]);
    cmd.assert().success().stdout(contains(
        "Chart:\nfcfs: cpu-utilization=91.67 avg-waiting-time=4.33 avg-turnaround-time=8.33 avg-response-time=4.33 throughput=25.00\n",
    ));
}

#[test]
fn compare_json_reports_winner() {
    let path = write_temp_file(RUNS, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap(), "--format", "json"]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(value["comparison"]["kind"], "ranked");
    assert_eq!(value["comparison"]["winner"], "sjf");
    assert_eq!(value["comparison"]["ranking"][2]["algorithm"], "round-robin");
    assert!(value.get("chart").is_none());
}

#[test]
fn rerun_in_file_replaces_earlier_entry() {
    let runs = r#"[
      { "algorithm": "fcfs", "results": [], "statistics": { "avgWaitingTime": 9 } },
      { "algorithm": "fcfs", "results": [], "statistics": { "avgWaitingTime": 1 } }
    ]"#;
    let path = write_temp_file(runs, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(diff("Insufficient data: 1 of 2 required runs\n"));
}

#[test]
fn malformed_entries_are_skipped() {
    let runs = r#"[
      { "algorithm": "fcfs", "results": [], "statistics": { "avgWaitingTime": 4 } },
      { "algorithm": "sjf", "results": [] },
      { "algorithm": "srtf", "results": [], "statistics": { "avgWaitingTime": 2 } }
    ]"#;
    let path = write_temp_file(runs, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap(), "--format", "summary"]);
    cmd.assert().success().stdout(diff(concat!(
        "Ranking:\n",
        "1. srtf (20.00%)\n",
        "2. fcfs (0.00%)\n",
        "Winner: srtf\n",
    )));
}

#[test]
fn unreported_metrics_are_missing_not_zero() {
    let runs = r#"[
      { "algorithm": "fcfs", "results": [], "statistics": { "cpuUtilization": 80, "avgWaitingTime": 4 } },
      { "algorithm": "sjf", "results": [], "statistics": { "cpuUtilization": "oops", "avgWaitingTime": 2 } }
    ]"#;
    let path = write_temp_file(runs, "json");
    let expected = concat!(
        "Runs: 2\n",
        "Metrics:\n",
        "fcfs: cpu-utilization=80.00 avg-waiting-time=4.00 avg-turnaround-time=n/a avg-response-time=n/a throughput=n/a\n",
        "sjf: cpu-utilization=n/a avg-waiting-time=2.00 avg-turnaround-time=n/a avg-response-time=n/a throughput=n/a\n",
        "Best:\n",
        "cpu-utilization: fcfs (80.00)\n",
        "avg-waiting-time: sjf (2.00)\n",
        "avg-turnaround-time: n/a\n",
        "avg-response-time: n/a\n",
        "throughput: n/a\n",
        "Ranking:\n",
        "1. sjf: 1.00 (20.00%)\n",
        "2. fcfs: 0.00 (0.00%)\n",
        "Winner: sjf\n",
        "Chart:\n",
        "fcfs: cpu-utilization=80.00 avg-waiting-time=4.00 avg-turnaround-time=n/a avg-response-time=n/a throughput=n/a\n",
        "sjf: cpu-utilization=n/a avg-waiting-time=2.00 avg-turnaround-time=n/a avg-response-time=n/a throughput=n/a\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["compare", "--runs", path.to_str().unwrap(), "--chart"]);
    cmd.assert().success().stdout(diff(expected));
}
