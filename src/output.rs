use serde::Serialize;
use serde_json::json;

use crate::analytics::{ChartRow, Comparison, ComparisonReport, Metric, MIN_RUNS};
use crate::models::{format_stat, Process};
use crate::state::SimulationSnapshot;

pub trait Formatter {
    /// `chart` is empty unless chart rows were requested.
    fn comparison(&self, comparison: &Comparison, chart: &[ChartRow]) -> String;

    fn snapshot(&self, snapshot: &SimulationSnapshot, message: Option<&str>) -> String;

    fn replay(
        &self,
        snapshot: &SimulationSnapshot,
        message: Option<&str>,
        comparison: &Comparison,
    ) -> String {
        let mut out = self.snapshot(snapshot, message);
        out.push_str(&self.comparison(comparison, &[]));
        out
    }
}

pub struct HumanFormatter;
pub struct SummaryFormatter;
pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn comparison(&self, comparison: &Comparison, chart: &[ChartRow]) -> String {
        let mut out = String::new();
        match comparison {
            Comparison::InsufficientData { runs } => out.push_str(&insufficient(*runs)),
            Comparison::Ranked(report) => write_report(&mut out, report),
        }
        if !chart.is_empty() {
            out.push_str("Chart:\n");
            for row in chart {
                out.push_str(&format!(
                    "{}: {}={} {}={} {}={} {}={} {}={}\n",
                    row.algorithm,
                    Metric::CpuUtilization,
                    row.cpu_utilization,
                    Metric::AvgWaitingTime,
                    row.avg_waiting_time,
                    Metric::AvgTurnaroundTime,
                    row.avg_turnaround_time,
                    Metric::AvgResponseTime,
                    row.avg_response_time,
                    Metric::Throughput,
                    row.throughput
                ));
            }
        }
        out
    }

    fn snapshot(&self, snapshot: &SimulationSnapshot, message: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str(&format!("Status: {}\n", snapshot.status));
        match snapshot.algorithm_config.time_quantum {
            Some(quantum) => out.push_str(&format!(
                "Algorithm: {} (quantum: {})\n",
                snapshot.algorithm, quantum
            )),
            None => out.push_str(&format!("Algorithm: {}\n", snapshot.algorithm)),
        }
        out.push_str(&format!("Time: {}\n", snapshot.current_time));

        let running = snapshot.running.as_ref().map_or_else(
            || "-".to_string(),
            |process| match process.progress {
                Some(progress) => format!("{} ({}%)", process.label(), format_stat(progress)),
                None => process.label().to_string(),
            },
        );
        out.push_str(&format!("Running: {}\n", running));
        out.push_str(&format!("Ready: {}\n", labels(&snapshot.ready_queue)));
        out.push_str(&format!("Waiting: {}\n", labels(&snapshot.waiting_queue)));
        out.push_str(&format!("Completed: {}\n", labels(&snapshot.completed)));

        let stats = &snapshot.statistics;
        out.push_str("Statistics:\n");
        out.push_str(&format!("total-processes: {}\n", stats.total_processes));
        out.push_str(&format!("total-time: {}\n", stats.total_time));
        out.push_str(&format!("cpu-utilization: {}\n", stats.cpu_utilization));
        out.push_str(&format!("avg-waiting-time: {}\n", stats.avg_waiting_time));
        out.push_str(&format!(
            "avg-turnaround-time: {}\n",
            stats.avg_turnaround_time
        ));
        out.push_str(&format!("avg-response-time: {}\n", stats.avg_response_time));
        out.push_str(&format!(
            "avg-arrivals-per-step: {}\n",
            stats.avg_arrivals_per_step
        ));
        out.push_str(&format!("throughput: {}\n", stats.throughput));

        if let Some(detailed) = &snapshot.detailed_metrics {
            if let Some(switches) = detailed.context_switches {
                out.push_str(&format!("context-switches: {}\n", switches));
            }
            if let Some(idle) = &detailed.cpu_idle_percentage {
                out.push_str(&format!("cpu-idle-percentage: {}\n", idle));
            }
        }
        if let Some(message) = message {
            out.push_str(&format!("Message: {}\n", message));
        }
        out
    }
}

impl Formatter for SummaryFormatter {
    fn comparison(&self, comparison: &Comparison, _chart: &[ChartRow]) -> String {
        match comparison {
            Comparison::InsufficientData { runs } => insufficient(*runs),
            Comparison::Ranked(report) => {
                let mut out = String::from("Ranking:\n");
                write_ranking(&mut out, report, false);
                out.push_str(&format!("Winner: {}\n", report.winner));
                out
            }
        }
    }

    fn snapshot(&self, snapshot: &SimulationSnapshot, message: Option<&str>) -> String {
        let mut out = format!(
            "Status: {}\nTime: {}\nCompleted: {}/{}\n",
            snapshot.status,
            snapshot.current_time,
            snapshot.completed.len(),
            snapshot.processes.len()
        );
        if let Some(message) = message {
            out.push_str(&format!("Message: {}\n", message));
        }
        out
    }
}

#[derive(Serialize)]
struct ComparisonOutput<'a> {
    comparison: &'a Comparison,
    #[serde(skip_serializing_if = "<[ChartRow]>::is_empty")]
    chart: &'a [ChartRow],
}

impl Formatter for JsonFormatter {
    fn comparison(&self, comparison: &Comparison, chart: &[ChartRow]) -> String {
        to_json(&ComparisonOutput { comparison, chart })
    }

    fn snapshot(&self, snapshot: &SimulationSnapshot, message: Option<&str>) -> String {
        to_json(&json!({ "snapshot": snapshot, "statusMessage": message }))
    }

    fn replay(
        &self,
        snapshot: &SimulationSnapshot,
        message: Option<&str>,
        comparison: &Comparison,
    ) -> String {
        to_json(&json!({
            "snapshot": snapshot,
            "statusMessage": message,
            "comparison": comparison,
        }))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(mut text) => {
            text.push('\n');
            text
        }
        Err(err) => format!("{{\"error\": \"{}\"}}\n", err),
    }
}

fn insufficient(runs: usize) -> String {
    format!(
        "Insufficient data: {} of {} required runs\n",
        runs, MIN_RUNS
    )
}

fn labels(processes: &[Process]) -> String {
    if processes.is_empty() {
        return "-".to_string();
    }
    processes
        .iter()
        .map(Process::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_report(out: &mut String, report: &ComparisonReport) {
    out.push_str(&format!("Runs: {}\n", report.projections.len()));
    out.push_str("Metrics:\n");
    for projection in &report.projections {
        let values: Vec<String> = projection
            .values
            .iter()
            .map(|entry| {
                let value = entry.value.map_or_else(|| "n/a".to_string(), format_stat);
                format!("{}={}", entry.metric, value)
            })
            .collect();
        out.push_str(&format!("{}: {}\n", projection.algorithm, values.join(" ")));
    }

    out.push_str("Best:\n");
    for entry in &report.bests {
        match &entry.best {
            Some(best) => out.push_str(&format!(
                "{}: {} ({})\n",
                entry.metric,
                best.algorithm,
                format_stat(best.value)
            )),
            None => out.push_str(&format!("{}: n/a\n", entry.metric)),
        }
    }

    out.push_str("Ranking:\n");
    write_ranking(out, report, true);
    out.push_str(&format!("Winner: {}\n", report.winner));
}

fn write_ranking(out: &mut String, report: &ComparisonReport, with_score: bool) {
    for (idx, ranked) in report.ranking.iter().enumerate() {
        if with_score {
            out.push_str(&format!(
                "{}. {}: {} ({}%)\n",
                idx + 1,
                ranked.algorithm,
                format_stat(ranked.score),
                format_stat(ranked.percentage)
            ));
        } else {
            out.push_str(&format!(
                "{}. {} ({}%)\n",
                idx + 1,
                ranked.algorithm,
                format_stat(ranked.percentage)
            ));
        }
    }
}
