use predicates::str::diff;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn write_temp_events(lines: &[&str]) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!("sched-dash-events-{}-{}.jsonl", nanos, seq));
    fs::write(&path, lines.join("\n")).expect("events write should succeed");
    path
}

const SELECT: &str =
    r#"{"command":"select","algorithm":"round-robin","config":{"timeQuantum":2}}"#;
const PROCESSES: &str = r#"{"command":"processes","processes":[{"id":"p1","name":"A","arrivalTime":0,"burstTime":3},{"id":"p2","name":"B","arrivalTime":1,"burstTime":2}]}"#;
const START: &str = r#"{"command":"start"}"#;
const FIRST_STEP: &str = r#"{"event":"step","payload":{"currentTime":1,"readyQueue":[{"id":"p2","name":"B","burstTime":2,"state":"ready"}],"runningProcess":{"id":"p1","name":"A","burstTime":3,"remainingTime":2,"state":"running"},"statistics":{"cpuUtilization":100}}}"#;
const CORRUPT_STEP: &str = r#"{"event":"step","payload":{"currentTime":2,"readyQueue":"corrupted","statistics":{"throughput":"NaN"}}}"#;
const COMPLETED: &str = r#"{"event":"completed","payload":{"results":[{"id":"p1","name":"A","burstTime":3,"remainingTime":0},{"id":"p2","name":"B","burstTime":2,"remainingTime":0}],"statistics":{"totalProcesses":2,"totalTime":5,"cpuUtilization":100,"avgWaitingTime":1.5,"avgTurnaroundTime":4,"avgResponseTime":1,"throughput":0.4}}}"#;

#[test]
fn replay_mid_run_shows_running_slot() {
    let path = write_temp_events(&[SELECT, PROCESSES, START, FIRST_STEP]);
    let expected = concat!(
        "Status: running\n",
        "Algorithm: round-robin (quantum: 2)\n",
        "Time: 1\n",
        "Running: A (33.33%)\n",
        "Ready: B\n",
        "Waiting: -\n",
        "Completed: -\n",
        "Statistics:\n",
        "total-processes: 0\n",
        "total-time: 0\n",
        "cpu-utilization: 100.00\n",
        "avg-waiting-time: 0.00\n",
        "avg-turnaround-time: 0.00\n",
        "avg-response-time: 0.00\n",
        "avg-arrivals-per-step: 0.00\n",
        "throughput: 0.00\n",
        "Insufficient data: 0 of 2 required runs\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["replay", "--events", path.to_str().unwrap(), "--salt", "1"]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn replay_to_completion_keeps_last_good_values() {
    let path = write_temp_events(&[
        SELECT,
        PROCESSES,
        START,
        FIRST_STEP,
        CORRUPT_STEP,
        COMPLETED,
    ]);
    let expected = concat!(
        "Status: completed\n",
        "Algorithm: round-robin (quantum: 2)\n",
        "Time: 5\n",
        "Running: -\n",
        "Ready: -\n",
        "Waiting: -\n",
        "Completed: A, B\n",
        "Statistics:\n",
        "total-processes: 2\n",
        "total-time: 5\n",
        "cpu-utilization: 100.00\n",
        "avg-waiting-time: 1.50\n",
        "avg-turnaround-time: 4.00\n",
        "avg-response-time: 1.00\n",
        "avg-arrivals-per-step: 0.00\n",
        "throughput: 0.40\n",
        "Insufficient data: 1 of 2 required runs\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args(["replay", "--events", path.to_str().unwrap()]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn replay_error_event_reports_message() {
    let path = write_temp_events(&[
        PROCESSES,
        START,
        r#"{"event":"error","payload":{"message":"scheduler crashed"}}"#,
    ]);
    let expected = concat!(
        "Status: idle\n",
        "Time: 0\n",
        "Completed: 0/2\n",
        "Message: scheduler crashed\n",
        "Insufficient data: 0 of 2 required runs\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args([
        "replay",
        "--events",
        path.to_str().unwrap(),
        "--format",
        "summary",
    ]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn replay_algo_flag_sets_default_selection() {
    let path = write_temp_events(&[r#"{"command":"reset"}"#]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sched-dash");
    cmd.args([
        "replay",
        "--events",
        path.to_str().unwrap(),
        "--algo",
        "rr",
        "--quantum",
        "4",
        "--format",
        "json",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(value["snapshot"]["algorithm"], "round-robin");
    assert_eq!(value["snapshot"]["algorithmConfig"]["timeQuantum"], 4);
    assert_eq!(value["snapshot"]["status"], "idle");
    assert!(value["statusMessage"].is_null());
    assert_eq!(value["comparison"]["kind"], "insufficient-data");
}
