use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{format_stat, parse_stat, Algorithm, Statistics};
use crate::state::AlgorithmRunResult;

pub const DEFAULT_THROUGHPUT_CHART_SCALE: f64 = 100.0;
/// Fewer stored runs than this yield [`Comparison::InsufficientData`].
pub const MIN_RUNS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    CpuUtilization,
    AvgWaitingTime,
    AvgTurnaroundTime,
    AvgResponseTime,
    Throughput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::HigherIsBetter => candidate > current,
            Direction::LowerIsBetter => candidate < current,
        }
    }
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::CpuUtilization,
        Metric::AvgWaitingTime,
        Metric::AvgTurnaroundTime,
        Metric::AvgResponseTime,
        Metric::Throughput,
    ];

    pub fn direction(self) -> Direction {
        match self {
            Metric::CpuUtilization | Metric::Throughput => Direction::HigherIsBetter,
            Metric::AvgWaitingTime | Metric::AvgTurnaroundTime | Metric::AvgResponseTime => {
                Direction::LowerIsBetter
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::CpuUtilization => "cpu-utilization",
            Metric::AvgWaitingTime => "avg-waiting-time",
            Metric::AvgTurnaroundTime => "avg-turnaround-time",
            Metric::AvgResponseTime => "avg-response-time",
            Metric::Throughput => "throughput",
        }
    }

    pub fn value_of(self, statistics: &Statistics) -> Option<f64> {
        let text = match self {
            Metric::CpuUtilization => &statistics.cpu_utilization,
            Metric::AvgWaitingTime => &statistics.avg_waiting_time,
            Metric::AvgTurnaroundTime => &statistics.avg_turnaround_time,
            Metric::AvgResponseTime => &statistics.avg_response_time,
            Metric::Throughput => &statistics.throughput,
        };
        parse_stat(text)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value.trim())
            .ok_or_else(|| Error::UnknownMetric(value.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MetricWeight {
    pub metric: Metric,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricValue {
    pub metric: Metric,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunProjection {
    pub algorithm: Algorithm,
    pub values: Vec<MetricValue>,
}

impl RunProjection {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|entry| entry.metric == metric)
            .and_then(|entry| entry.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BestRun {
    pub algorithm: Algorithm,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricBest {
    pub metric: Metric,
    pub best: Option<BestRun>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedRun {
    pub algorithm: Algorithm,
    pub score: f64,
    pub percentage: f64,
    pub contributions: Vec<MetricValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub projections: Vec<RunProjection>,
    pub bests: Vec<MetricBest>,
    pub ranking: Vec<RankedRun>,
    pub winner: Algorithm,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Comparison {
    InsufficientData { runs: usize },
    Ranked(ComparisonReport),
}

/// Statistics with throughput scaled for chart visibility, re-stringified.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRow {
    pub algorithm: Algorithm,
    pub cpu_utilization: String,
    pub avg_waiting_time: String,
    pub avg_turnaround_time: String,
    pub avg_response_time: String,
    pub throughput: String,
}

/// Ranks completed runs against each other.
///
/// Each metric is min-max normalized across the runs that report it and
/// inverted when lower is better. A metric on which every run is equal
/// contributes `0` to every run, as does a missing value.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonAnalytics {
    metrics: Vec<MetricWeight>,
    throughput_chart_scale: f64,
}

impl Default for ComparisonAnalytics {
    fn default() -> Self {
        Self::new(
            Metric::ALL
                .into_iter()
                .map(|metric| MetricWeight {
                    metric,
                    weight: 1.0,
                })
                .collect(),
        )
    }
}

impl ComparisonAnalytics {
    pub fn new(metrics: Vec<MetricWeight>) -> Self {
        Self {
            metrics,
            throughput_chart_scale: DEFAULT_THROUGHPUT_CHART_SCALE,
        }
    }

    pub fn with_throughput_chart_scale(mut self, scale: f64) -> Self {
        self.throughput_chart_scale = scale;
        self
    }

    pub fn metrics(&self) -> &[MetricWeight] {
        &self.metrics
    }

    pub fn project(&self, run: &AlgorithmRunResult) -> RunProjection {
        RunProjection {
            algorithm: run.algorithm,
            values: self
                .metrics
                .iter()
                .map(|entry| MetricValue {
                    metric: entry.metric,
                    value: run.metric_value(entry.metric),
                })
                .collect(),
        }
    }

    /// First-seen wins on ties.
    pub fn best_per_metric(&self, runs: &[AlgorithmRunResult]) -> Vec<MetricBest> {
        self.metrics
            .iter()
            .map(|entry| {
                let direction = entry.metric.direction();
                let mut best: Option<BestRun> = None;
                for run in runs {
                    let Some(value) = run.metric_value(entry.metric) else {
                        continue;
                    };
                    let improves = best
                        .as_ref()
                        .map_or(true, |current| direction.improves(value, current.value));
                    if improves {
                        best = Some(BestRun {
                            algorithm: run.algorithm,
                            value,
                        });
                    }
                }
                MetricBest {
                    metric: entry.metric,
                    best,
                }
            })
            .collect()
    }

    /// Scores every run and sorts descending; ties keep store order.
    pub fn rank(&self, runs: &[AlgorithmRunResult]) -> Vec<RankedRun> {
        let mut ranking: Vec<RankedRun> = runs
            .iter()
            .map(|run| RankedRun {
                algorithm: run.algorithm,
                score: 0.0,
                percentage: 0.0,
                contributions: Vec::with_capacity(self.metrics.len()),
            })
            .collect();

        for entry in &self.metrics {
            let values: Vec<Option<f64>> = runs
                .iter()
                .map(|run| run.metric_value(entry.metric))
                .collect();
            let bounds = values.iter().flatten().fold(None, |acc, &value| match acc {
                None => Some((value, value)),
                Some((min, max)) => Some((f64::min(min, value), f64::max(max, value))),
            });

            for (ranked, value) in ranking.iter_mut().zip(&values) {
                let contribution = match (bounds, value) {
                    (Some((min, max)), Some(value)) if max > min => {
                        let normalized = (value - min) / (max - min);
                        match entry.metric.direction() {
                            Direction::HigherIsBetter => normalized,
                            Direction::LowerIsBetter => 1.0 - normalized,
                        }
                    }
                    _ => 0.0,
                };
                ranked.score += contribution * entry.weight;
                ranked.contributions.push(MetricValue {
                    metric: entry.metric,
                    value: Some(contribution),
                });
            }
        }

        let total_weight = self.total_weight();
        for ranked in &mut ranking {
            ranked.percentage = if total_weight > 0.0 {
                ranked.score / total_weight * 100.0
            } else {
                0.0
            };
        }
        ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranking
    }

    pub fn compare(&self, runs: &[AlgorithmRunResult]) -> Comparison {
        if runs.len() < MIN_RUNS {
            return Comparison::InsufficientData { runs: runs.len() };
        }
        let ranking = self.rank(runs);
        let winner = ranking[0].algorithm;
        Comparison::Ranked(ComparisonReport {
            projections: runs.iter().map(|run| self.project(run)).collect(),
            bests: self.best_per_metric(runs),
            ranking,
            winner,
        })
    }

    /// Unreported metrics render as `n/a`.
    pub fn chart_rows(&self, runs: &[AlgorithmRunResult]) -> Vec<ChartRow> {
        runs.iter()
            .map(|run| {
                let cell = |metric: Metric, scale: f64| {
                    run.metric_value(metric)
                        .map_or_else(|| "n/a".to_string(), |value| format_stat(value * scale))
                };
                ChartRow {
                    algorithm: run.algorithm,
                    cpu_utilization: cell(Metric::CpuUtilization, 1.0),
                    avg_waiting_time: cell(Metric::AvgWaitingTime, 1.0),
                    avg_turnaround_time: cell(Metric::AvgTurnaroundTime, 1.0),
                    avg_response_time: cell(Metric::AvgResponseTime, 1.0),
                    throughput: cell(Metric::Throughput, self.throughput_chart_scale),
                }
            })
            .collect()
    }

    fn total_weight(&self) -> f64 {
        self.metrics.iter().map(|entry| entry.weight).sum()
    }
}
