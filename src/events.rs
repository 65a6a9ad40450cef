use serde::Serialize;
use serde_json::{Map, Value};

use crate::analytics::Metric;
use crate::error::{Error, Result};
use crate::models::{
    count_from, lookup, number_from, Algorithm, AlgorithmConfig, DetailedMetrics, Process,
    RawProcess, SimulationStatus, Statistics,
};

/// One field of a partial update as seen at the wire boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Incoming<T> {
    #[default]
    Absent,
    Malformed,
    Present(T),
}

impl<T> Incoming<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Incoming::Absent)
    }
}

/// Partial snapshot carried by a `step` event or a batch result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepUpdate {
    pub seq: Option<u64>,
    pub current_time: Incoming<u64>,
    pub processes: Incoming<Vec<RawProcess>>,
    pub ready_queue: Incoming<Vec<RawProcess>>,
    pub running: Incoming<Option<RawProcess>>,
    pub waiting_queue: Incoming<Vec<RawProcess>>,
    pub completed: Incoming<Vec<RawProcess>>,
    pub statistics: Incoming<StatsPatch>,
    pub detailed_metrics: Incoming<DetailedPatch>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsPatch {
    pub total_processes: Incoming<u64>,
    pub total_time: Incoming<u64>,
    pub cpu_utilization: Incoming<f64>,
    pub avg_waiting_time: Incoming<f64>,
    pub avg_turnaround_time: Incoming<f64>,
    pub avg_response_time: Incoming<f64>,
    pub avg_arrivals_per_step: Incoming<f64>,
    pub throughput: Incoming<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetailedPatch {
    pub context_switches: Incoming<u64>,
    pub cpu_idle_percentage: Incoming<f64>,
}

impl StepUpdate {
    /// Parses a duck-typed partial snapshot. A non-object yields an empty
    /// update; individual fields that do not have the expected shape are
    /// marked [`Incoming::Malformed`].
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            seq: lookup(obj, &["seq", "sequence"]).and_then(count_from),
            current_time: parse_field(obj, &["currentTime", "time"], count_from),
            processes: list_field(obj, &["processes"]),
            ready_queue: list_field(obj, &["readyQueue", "ready"]),
            running: running_field(obj),
            waiting_queue: list_field(obj, &["waitingQueue", "blockedQueue", "waiting"]),
            completed: list_field(obj, &["completedProcesses", "completedQueue", "completed"]),
            statistics: match lookup(obj, &["statistics", "stats"]) {
                None => Incoming::Absent,
                Some(value) => StatsPatch::from_value(value),
            },
            detailed_metrics: match lookup(obj, &["detailedMetrics"]) {
                None => Incoming::Absent,
                Some(value) => DetailedPatch::from_value(value),
            },
        }
    }
}

impl StatsPatch {
    pub fn from_value(value: &Value) -> Incoming<Self> {
        let Some(obj) = value.as_object() else {
            return Incoming::Malformed;
        };
        Incoming::Present(Self {
            total_processes: parse_field(obj, &["totalProcesses"], count_from),
            total_time: parse_field(obj, &["totalTime"], count_from),
            cpu_utilization: parse_field(obj, &["cpuUtilization"], number_from),
            avg_waiting_time: parse_field(obj, &["avgWaitingTime"], number_from),
            avg_turnaround_time: parse_field(obj, &["avgTurnaroundTime"], number_from),
            avg_response_time: parse_field(obj, &["avgResponseTime"], number_from),
            avg_arrivals_per_step: parse_field(obj, &["avgArrivalsPerStep"], number_from),
            throughput: parse_field(obj, &["throughput"], number_from),
        })
    }
}

impl DetailedPatch {
    pub fn from_value(value: &Value) -> Incoming<Self> {
        let Some(obj) = value.as_object() else {
            return Incoming::Malformed;
        };
        Incoming::Present(Self {
            context_switches: parse_field(obj, &["contextSwitches"], count_from),
            cpu_idle_percentage: parse_field(obj, &["cpuIdlePercentage"], number_from),
        })
    }
}

fn parse_field<T>(
    obj: &Map<String, Value>,
    keys: &[&str],
    parse: impl Fn(&Value) -> Option<T>,
) -> Incoming<T> {
    match lookup(obj, keys) {
        None => Incoming::Absent,
        Some(value) => parse(value).map_or(Incoming::Malformed, Incoming::Present),
    }
}

fn list_field(obj: &Map<String, Value>, keys: &[&str]) -> Incoming<Vec<RawProcess>> {
    match lookup(obj, keys) {
        None => Incoming::Absent,
        Some(value) => process_list(value).map_or(Incoming::Malformed, Incoming::Present),
    }
}

fn running_field(obj: &Map<String, Value>) -> Incoming<Option<RawProcess>> {
    let Some(value) = lookup(obj, &["runningProcess", "running"]) else {
        return Incoming::Absent;
    };
    match value {
        Value::Null => Incoming::Present(None),
        Value::Array(items) => match items.as_slice() {
            [] => Incoming::Present(None),
            [only] => RawProcess::from_value(only)
                .map_or(Incoming::Malformed, |raw| Incoming::Present(Some(raw))),
            _ => Incoming::Malformed,
        },
        other => RawProcess::from_value(other)
            .map_or(Incoming::Malformed, |raw| Incoming::Present(Some(raw))),
    }
}

/// A well-formed list is an array whose every element is an object.
pub fn process_list(value: &Value) -> Option<Vec<RawProcess>> {
    value
        .as_array()?
        .iter()
        .map(RawProcess::from_value)
        .collect()
}

impl StatsPatch {
    /// Full statistics with every field this patch does not carry left at zero.
    pub fn to_statistics(&self) -> Statistics {
        let mut statistics = Statistics::default();
        self.apply_to(&mut statistics, |_| {});
        statistics
    }

    /// Comparison metrics without a usable value, absent or malformed alike.
    pub fn unreported_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|metric| !matches!(self.metric(*metric), Incoming::Present(_)))
            .collect()
    }

    fn metric(&self, metric: Metric) -> &Incoming<f64> {
        match metric {
            Metric::CpuUtilization => &self.cpu_utilization,
            Metric::AvgWaitingTime => &self.avg_waiting_time,
            Metric::AvgTurnaroundTime => &self.avg_turnaround_time,
            Metric::AvgResponseTime => &self.avg_response_time,
            Metric::Throughput => &self.throughput,
        }
    }
}

pub fn detailed_metrics_from(value: &Value) -> Option<DetailedMetrics> {
    let Incoming::Present(patch) = DetailedPatch::from_value(value) else {
        return None;
    };
    let mut metrics = DetailedMetrics::default();
    patch.apply_to(&mut metrics, |_| {});
    Some(metrics)
}

impl From<&DetailedMetrics> for DetailedPatch {
    fn from(metrics: &DetailedMetrics) -> Self {
        Self {
            context_switches: metrics
                .context_switches
                .map_or(Incoming::Absent, Incoming::Present),
            cpu_idle_percentage: match metrics.cpu_idle_percentage.as_deref() {
                None => Incoming::Absent,
                Some(text) => {
                    crate::models::parse_stat(text).map_or(Incoming::Malformed, Incoming::Present)
                }
            },
        }
    }
}

/// Outcome of merging one field, reported by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldMerge {
    Applied(&'static str),
    Retained(&'static str),
}

impl StatsPatch {
    /// Merges each present, finite field into `target`, leaving the others
    /// at their previous value.
    pub fn apply_to(&self, target: &mut Statistics, mut on_field: impl FnMut(FieldMerge)) {
        merge_count(
            &mut target.total_processes,
            &self.total_processes,
            "statistics.totalProcesses",
            &mut on_field,
        );
        merge_count(
            &mut target.total_time,
            &self.total_time,
            "statistics.totalTime",
            &mut on_field,
        );
        merge_decimal(
            &mut target.cpu_utilization,
            &self.cpu_utilization,
            "statistics.cpuUtilization",
            &mut on_field,
        );
        merge_decimal(
            &mut target.avg_waiting_time,
            &self.avg_waiting_time,
            "statistics.avgWaitingTime",
            &mut on_field,
        );
        merge_decimal(
            &mut target.avg_turnaround_time,
            &self.avg_turnaround_time,
            "statistics.avgTurnaroundTime",
            &mut on_field,
        );
        merge_decimal(
            &mut target.avg_response_time,
            &self.avg_response_time,
            "statistics.avgResponseTime",
            &mut on_field,
        );
        merge_decimal(
            &mut target.avg_arrivals_per_step,
            &self.avg_arrivals_per_step,
            "statistics.avgArrivalsPerStep",
            &mut on_field,
        );
        merge_decimal(
            &mut target.throughput,
            &self.throughput,
            "statistics.throughput",
            &mut on_field,
        );
    }
}

impl DetailedPatch {
    pub fn apply_to(&self, target: &mut DetailedMetrics, mut on_field: impl FnMut(FieldMerge)) {
        let name = "detailedMetrics.contextSwitches";
        match self.context_switches {
            Incoming::Absent => {}
            Incoming::Present(count) => {
                target.context_switches = Some(count);
                on_field(FieldMerge::Applied(name));
            }
            Incoming::Malformed => on_field(FieldMerge::Retained(name)),
        }

        let name = "detailedMetrics.cpuIdlePercentage";
        match self.cpu_idle_percentage {
            Incoming::Absent => {}
            Incoming::Present(value) if value.is_finite() => {
                target.cpu_idle_percentage = Some(crate::models::format_stat(value));
                on_field(FieldMerge::Applied(name));
            }
            _ => on_field(FieldMerge::Retained(name)),
        }
    }
}

fn merge_count(
    slot: &mut u64,
    incoming: &Incoming<u64>,
    name: &'static str,
    on_field: &mut impl FnMut(FieldMerge),
) {
    match incoming {
        Incoming::Absent => {}
        Incoming::Present(count) => {
            *slot = *count;
            on_field(FieldMerge::Applied(name));
        }
        Incoming::Malformed => on_field(FieldMerge::Retained(name)),
    }
}

fn merge_decimal(
    slot: &mut String,
    incoming: &Incoming<f64>,
    name: &'static str,
    on_field: &mut impl FnMut(FieldMerge),
) {
    match incoming {
        Incoming::Absent => {}
        Incoming::Present(value) if value.is_finite() => {
            *slot = crate::models::format_stat(*value);
            on_field(FieldMerge::Applied(name));
        }
        _ => on_field(FieldMerge::Retained(name)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub status: SimulationStatus,
    pub tick_speed: Option<u64>,
}

/// Events emitted by the simulation service over the stream.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    Step(StepUpdate),
    /// Raw completion payload; validated before it reaches the store.
    Completed(Value),
    Error(String),
    State(StateChange),
}

impl ServerEvent {
    /// Parses the `{"event": ..., "payload": ...}` envelope.
    pub fn from_envelope(value: &Value) -> Result<Self> {
        let (name, payload) = envelope_parts(value)?;
        Self::from_parts(name, payload)
    }

    pub fn from_parts(name: &str, payload: &Value) -> Result<Self> {
        match name {
            "step" => Ok(ServerEvent::Step(StepUpdate::from_value(payload))),
            "completed" => Ok(ServerEvent::Completed(payload.clone())),
            "error" => {
                let message = match payload {
                    Value::String(text) => text.clone(),
                    Value::Object(obj) => obj
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                    _ => "unknown error".to_string(),
                };
                Ok(ServerEvent::Error(message))
            }
            "state" => state_change(payload).map(ServerEvent::State),
            other => Err(Error::MalformedPayload(format!(
                "unknown event '{}'",
                other
            ))),
        }
    }
}

pub(crate) fn envelope_parts(value: &Value) -> Result<(&str, &Value)> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedPayload("event must be an object".to_string()))?;
    let name = obj
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedPayload("event name missing".to_string()))?;
    Ok((name, obj.get("payload").unwrap_or(&Value::Null)))
}

fn state_change(payload: &Value) -> Result<StateChange> {
    match payload {
        Value::String(status) => Ok(StateChange {
            status: status.parse::<SimulationStatus>()?,
            tick_speed: None,
        }),
        Value::Object(obj) => {
            let status = obj
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::MalformedPayload("state without status".to_string()))?
                .parse::<SimulationStatus>()?;
            Ok(StateChange {
                status,
                tick_speed: lookup(obj, &["tickSpeed", "stepIntervalMs"]).and_then(count_from),
            })
        }
        _ => Err(Error::MalformedPayload(
            "state payload must be a status or an object".to_string(),
        )),
    }
}

/// Commands sent to the simulation service over the stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    Start {
        algorithm: Algorithm,
        processes: Vec<Process>,
        step_interval_ms: u64,
        config: AlgorithmConfig,
    },
    Pause,
    Resume,
    Step,
    Reset,
    #[serde(rename_all = "camelCase")]
    ChangeTickSpeed { step_interval_ms: u64 },
}

/// A validated completion payload, shared by stream completions, batch
/// responses and stored run files.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedRun {
    pub algorithm: Option<Algorithm>,
    pub results: Vec<RawProcess>,
    /// Kept field by field so unreported metrics stay distinguishable from zero.
    pub statistics: StatsPatch,
    pub detailed_metrics: Option<DetailedMetrics>,
    pub completed_at_ms: Option<u64>,
}

impl CompletedRun {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::MalformedPayload("completion must be an object".to_string()))?;
        let results = lookup(obj, &["results", "processes"])
            .ok_or_else(|| Error::MalformedPayload("missing results".to_string()))
            .and_then(|value| {
                process_list(value).ok_or_else(|| {
                    Error::MalformedPayload("results must be an array of processes".to_string())
                })
            })?;
        let statistics = lookup(obj, &["statistics", "stats"])
            .ok_or_else(|| Error::MalformedPayload("missing statistics".to_string()))
            .and_then(|value| match StatsPatch::from_value(value) {
                Incoming::Present(patch) => Ok(patch),
                _ => Err(Error::MalformedPayload(
                    "statistics must be an object".to_string(),
                )),
            })?;
        let algorithm = match obj.get("algorithm").and_then(Value::as_str) {
            Some(id) => Some(id.parse::<Algorithm>()?),
            None => None,
        };

        Ok(Self {
            algorithm,
            results,
            statistics,
            detailed_metrics: obj.get("detailedMetrics").and_then(detailed_metrics_from),
            completed_at_ms: lookup(obj, &["completedAt", "timestamp"]).and_then(count_from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_update_marks_absent_and_malformed_fields() {
        let update = StepUpdate::from_value(&json!({
            "currentTime": 4,
            "readyQueue": "not-a-list",
            "waitingQueue": [{ "id": "p1", "burstTime": 2 }, 5],
            "statistics": { "cpuUtilization": 75, "throughput": "NaN" }
        }));

        assert_eq!(update.current_time, Incoming::Present(4));
        assert!(update.processes.is_absent());
        assert_eq!(update.ready_queue, Incoming::Malformed);
        assert_eq!(update.waiting_queue, Incoming::Malformed);
        let Incoming::Present(stats) = update.statistics else {
            panic!("statistics should parse");
        };
        assert_eq!(stats.cpu_utilization, Incoming::Present(75.0));
        assert_eq!(stats.throughput, Incoming::Malformed);
        assert!(stats.avg_waiting_time.is_absent());
    }

    #[test]
    fn running_slot_accepts_object_null_or_singleton() {
        let object = StepUpdate::from_value(&json!({ "runningProcess": { "id": "p1", "burstTime": 3 } }));
        assert!(matches!(object.running, Incoming::Present(Some(_))));

        let cleared = StepUpdate::from_value(&json!({ "runningProcess": null }));
        assert_eq!(cleared.running, Incoming::Present(None));

        let singleton = StepUpdate::from_value(&json!({ "running": [{ "id": "p2", "burstTime": 1 }] }));
        assert!(matches!(singleton.running, Incoming::Present(Some(_))));

        let crowded = StepUpdate::from_value(&json!({ "running": [{ "id": "a" }, { "id": "b" }] }));
        assert_eq!(crowded.running, Incoming::Malformed);
    }

    #[test]
    fn non_object_step_is_empty() {
        assert_eq!(StepUpdate::from_value(&json!([1, 2])), StepUpdate::default());
    }

    #[test]
    fn envelope_parses_state_with_tick_speed() {
        let event = ServerEvent::from_envelope(&json!({
            "event": "state",
            "payload": { "status": "paused", "tickSpeed": 250 }
        }))
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::State(StateChange {
                status: SimulationStatus::Paused,
                tick_speed: Some(250),
            })
        );

        let bare = ServerEvent::from_envelope(&json!({ "event": "state", "payload": "running" }))
            .unwrap();
        assert_eq!(
            bare,
            ServerEvent::State(StateChange {
                status: SimulationStatus::Running,
                tick_speed: None,
            })
        );
    }

    #[test]
    fn envelope_rejects_unknown_event() {
        let err = ServerEvent::from_envelope(&json!({ "event": "teleport" })).unwrap_err();
        assert_eq!(err.to_string(), "malformed payload: unknown event 'teleport'");
    }

    #[test]
    fn error_event_reads_message() {
        let event =
            ServerEvent::from_envelope(&json!({ "event": "error", "payload": { "message": "boom" } }))
                .unwrap();
        assert_eq!(event, ServerEvent::Error("boom".to_string()));
    }

    #[test]
    fn completed_run_requires_results_and_statistics() {
        let missing_stats = CompletedRun::from_value(&json!({ "results": [] })).unwrap_err();
        assert_eq!(missing_stats.to_string(), "malformed payload: missing statistics");

        let missing_results =
            CompletedRun::from_value(&json!({ "statistics": {} })).unwrap_err();
        assert_eq!(missing_results.to_string(), "malformed payload: missing results");
    }

    #[test]
    fn completed_run_normalizes_statistics() {
        let run = CompletedRun::from_value(&json!({
            "algorithm": "sjf",
            "results": [{ "id": "p1", "burstTime": 3, "remainingTime": 0 }],
            "statistics": { "totalProcesses": 1, "avgWaitingTime": 2.5, "throughput": "0.3333" },
            "detailedMetrics": { "contextSwitches": 4 }
        }))
        .unwrap();
        assert_eq!(run.algorithm, Some(Algorithm::Sjf));
        let statistics = run.statistics.to_statistics();
        assert_eq!(statistics.total_processes, 1);
        assert_eq!(statistics.avg_waiting_time, "2.50");
        assert_eq!(statistics.throughput, "0.33");
        assert_eq!(statistics.cpu_utilization, "0.00");
        assert_eq!(
            run.detailed_metrics.and_then(|metrics| metrics.context_switches),
            Some(4)
        );
    }

    #[test]
    fn completed_run_tracks_unreported_metrics() {
        let run = CompletedRun::from_value(&json!({
            "results": [],
            "statistics": { "cpuUtilization": 50, "avgWaitingTime": "NaN", "throughput": 0.2 }
        }))
        .unwrap();

        assert_eq!(
            run.statistics.unreported_metrics(),
            vec![
                Metric::AvgWaitingTime,
                Metric::AvgTurnaroundTime,
                Metric::AvgResponseTime
            ]
        );
    }

    #[test]
    fn start_command_serializes_camel_case() {
        let command = ClientCommand::Start {
            algorithm: Algorithm::RoundRobin,
            processes: Vec::new(),
            step_interval_ms: 500,
            config: AlgorithmConfig {
                time_quantum: Some(2),
            },
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "start",
                "algorithm": "round-robin",
                "processes": [],
                "stepIntervalMs": 500,
                "config": { "timeQuantum": 2 }
            })
        );
        let tick = serde_json::to_value(ClientCommand::ChangeTickSpeed { step_interval_ms: 100 })
            .unwrap();
        assert_eq!(tick, json!({ "type": "change-tick-speed", "stepIntervalMs": 100 }));
    }
}
