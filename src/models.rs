use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    Fcfs,
    Sjf,
    Srtf,
    #[serde(alias = "rr")]
    RoundRobin,
    Priority,
    PriorityPreemptive,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Fcfs,
        Algorithm::Sjf,
        Algorithm::Srtf,
        Algorithm::RoundRobin,
        Algorithm::Priority,
        Algorithm::PriorityPreemptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Fcfs => "fcfs",
            Algorithm::Sjf => "sjf",
            Algorithm::Srtf => "srtf",
            Algorithm::RoundRobin => "round-robin",
            Algorithm::Priority => "priority",
            Algorithm::PriorityPreemptive => "priority-preemptive",
        }
    }

    pub fn uses_time_quantum(&self) -> bool {
        matches!(self, Algorithm::RoundRobin)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "fcfs" => Ok(Algorithm::Fcfs),
            "sjf" => Ok(Algorithm::Sjf),
            "srtf" => Ok(Algorithm::Srtf),
            "rr" | "round-robin" => Ok(Algorithm::RoundRobin),
            "priority" => Ok(Algorithm::Priority),
            "priority-preemptive" => Ok(Algorithm::PriorityPreemptive),
            _ => Err(Error::UnknownAlgorithm(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_quantum: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SimulationStatus::Idle => "idle",
            SimulationStatus::Running => "running",
            SimulationStatus::Paused => "paused",
            SimulationStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl FromStr for SimulationStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(SimulationStatus::Idle),
            "running" => Ok(SimulationStatus::Running),
            "paused" => Ok(SimulationStatus::Paused),
            "completed" => Ok(SimulationStatus::Completed),
            _ => Err(Error::MalformedPayload(format!("unknown status '{}'", value))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    #[default]
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ProcessState {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(ProcessState::New),
            "ready" => Some(ProcessState::Ready),
            "running" => Some(ProcessState::Running),
            "waiting" | "blocked" => Some(ProcessState::Waiting),
            "terminated" | "completed" | "done" => Some(ProcessState::Terminated),
            _ => None,
        }
    }
}

/// A process as it arrives from a producer, before identity is guaranteed.
///
/// Built by [`RawProcess::from_value`], which clamps `remaining_time` into
/// `[0, burst_time]` and marks exhausted processes as terminated. Everything
/// else is carried through as reported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProcess {
    pub id: Option<String>,
    pub name: String,
    pub arrival_time: u64,
    pub burst_time: u64,
    pub io_burst_time: Option<u64>,
    pub priority: Option<i64>,
    pub remaining_time: u64,
    pub state: ProcessState,
    pub waiting_time: Option<u64>,
    pub turnaround_time: Option<u64>,
    pub response_time: Option<u64>,
    pub completion_time: Option<u64>,
}

impl RawProcess {
    pub fn new(id: Option<&str>, name: &str, arrival_time: u64, burst_time: u64) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.to_string(),
            arrival_time,
            burst_time,
            remaining_time: burst_time,
            state: if burst_time == 0 {
                ProcessState::Terminated
            } else {
                ProcessState::New
            },
            ..Self::default()
        }
    }

    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = match obj.get("id") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        let burst_time = count_field(obj, &["burstTime", "burst_time"]).unwrap_or(0);
        let remaining_time = count_field(obj, &["remainingTime", "remaining_time"])
            .unwrap_or(burst_time)
            .min(burst_time);
        let mut state = lookup(obj, &["state", "status"])
            .and_then(Value::as_str)
            .and_then(ProcessState::parse)
            .unwrap_or_default();
        if remaining_time == 0 {
            state = ProcessState::Terminated;
        }

        Some(Self {
            id,
            name: lookup(obj, &["name"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arrival_time: count_field(obj, &["arrivalTime", "arrival_time"]).unwrap_or(0),
            burst_time,
            io_burst_time: count_field(obj, &["ioBurstTime", "io_burst_time"]),
            priority: lookup(obj, &["priority"]).and_then(integer_from),
            remaining_time,
            state,
            waiting_time: count_field(obj, &["waitingTime", "waiting_time"]),
            turnaround_time: count_field(obj, &["turnaroundTime", "turnaround_time"]),
            response_time: count_field(obj, &["responseTime", "response_time"]),
            completion_time: count_field(obj, &["completionTime", "completion_time"]),
        })
    }
}

impl From<Process> for RawProcess {
    fn from(process: Process) -> Self {
        Self {
            id: Some(process.id),
            name: process.name,
            arrival_time: process.arrival_time,
            burst_time: process.burst_time,
            io_burst_time: process.io_burst_time,
            priority: process.priority,
            remaining_time: process.remaining_time,
            state: process.state,
            waiting_time: process.waiting_time,
            turnaround_time: process.turnaround_time,
            response_time: process.response_time,
            completion_time: process.completion_time,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: String,
    pub name: String,
    pub arrival_time: u64,
    pub burst_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_burst_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    pub remaining_time: u64,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnaround_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl Process {
    pub(crate) fn with_id(raw: RawProcess, id: String) -> Self {
        Self {
            id,
            name: raw.name,
            arrival_time: raw.arrival_time,
            burst_time: raw.burst_time,
            io_burst_time: raw.io_burst_time,
            priority: raw.priority,
            remaining_time: raw.remaining_time,
            state: raw.state,
            waiting_time: raw.waiting_time,
            turnaround_time: raw.turnaround_time,
            response_time: raw.response_time,
            completion_time: raw.completion_time,
            progress: None,
        }
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Rolling statistics. Decimal fields hold the canonical two-decimal form.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_processes: u64,
    pub total_time: u64,
    pub cpu_utilization: String,
    pub avg_waiting_time: String,
    pub avg_turnaround_time: String,
    pub avg_response_time: String,
    pub avg_arrivals_per_step: String,
    pub throughput: String,
}

impl Default for Statistics {
    fn default() -> Self {
        let zero = format_stat(0.0);
        Self {
            total_processes: 0,
            total_time: 0,
            cpu_utilization: zero.clone(),
            avg_waiting_time: zero.clone(),
            avg_turnaround_time: zero.clone(),
            avg_response_time: zero.clone(),
            avg_arrivals_per_step: zero.clone(),
            throughput: zero,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_switches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_idle_percentage: Option<String>,
}

pub fn format_stat(value: f64) -> String {
    // avoid "-0.00"
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.2}", value)
}

pub fn parse_stat(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub(crate) fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|value| value.is_finite()),
        Value::String(text) => parse_stat(text),
        _ => None,
    }
}

pub(crate) fn count_from(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    let number = number_from(value)?;
    if number >= 0.0 && number.fract() == 0.0 && number <= u64::MAX as f64 {
        Some(number as u64)
    } else {
        None
    }
}

fn integer_from(value: &Value) -> Option<i64> {
    if let Some(integer) = value.as_i64() {
        return Some(integer);
    }
    let number = number_from(value)?;
    if number.fract() == 0.0 && number.abs() <= i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

pub(crate) fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key))
}

fn count_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    lookup(obj, keys).and_then(count_from)
}
