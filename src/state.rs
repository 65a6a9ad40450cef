use serde::Serialize;

use crate::analytics::Metric;
use crate::models::{
    Algorithm, AlgorithmConfig, DetailedMetrics, Process, SimulationStatus, Statistics,
};

/// The consistent view of the simulation at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub current_time: u64,
    pub processes: Vec<Process>,
    pub ready_queue: Vec<Process>,
    pub running: Option<Process>,
    pub waiting_queue: Vec<Process>,
    pub completed: Vec<Process>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_metrics: Option<DetailedMetrics>,
    pub algorithm: Algorithm,
    pub algorithm_config: AlgorithmConfig,
    pub status: SimulationStatus,
}

impl SimulationSnapshot {
    pub fn initial(algorithm: Algorithm, algorithm_config: AlgorithmConfig) -> Self {
        Self {
            current_time: 0,
            processes: Vec::new(),
            ready_queue: Vec::new(),
            running: None,
            waiting_queue: Vec::new(),
            completed: Vec::new(),
            statistics: Statistics::default(),
            detailed_metrics: None,
            algorithm,
            algorithm_config,
            status: SimulationStatus::Idle,
        }
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.iter().any(|process| process.id == id)
    }
}

impl Default for SimulationSnapshot {
    fn default() -> Self {
        Self::initial(Algorithm::default(), AlgorithmConfig::default())
    }
}

/// One finished simulation, as held by the result store.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmRunResult {
    pub id: String,
    pub algorithm: Algorithm,
    pub processes: Vec<Process>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_metrics: Option<DetailedMetrics>,
    pub completed_at_ms: u64,
    /// Metrics the completion did not report; `statistics` holds zero for them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreported: Vec<Metric>,
}

impl AlgorithmRunResult {
    /// The value analytics sees, `None` when the metric was not reported.
    pub fn metric_value(&self, metric: Metric) -> Option<f64> {
        if self.unreported.contains(&metric) {
            return None;
        }
        metric.value_of(&self.statistics)
    }
}
