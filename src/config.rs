use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::{
    ComparisonAnalytics, Metric, MetricWeight, DEFAULT_THROUGHPUT_CHART_SCALE,
};
use crate::error::{Error, Result};
use crate::models::{Algorithm, AlgorithmConfig};
use crate::reconciler::{OrderingPolicy, ReconcilerOptions};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub reconciler: ReconcilerConfig,
    pub session: SessionConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub ordering: OrderingPolicy,
    pub id_salt: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub default_algorithm: Algorithm,
    pub time_quantum: u64,
    pub step_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_algorithm: Algorithm::Fcfs,
            time_quantum: 2,
            step_interval_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Metrics not listed keep a weight of 1.0; a weight of 0 drops a metric.
    pub weights: BTreeMap<String, f64>,
    pub throughput_chart_scale: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            throughput_chart_scale: DEFAULT_THROUGHPUT_CHART_SCALE,
        }
    }
}

impl AnalyticsConfig {
    pub fn weight(&self, metric: Metric) -> f64 {
        self.weights.get(metric.as_str()).copied().unwrap_or(1.0)
    }

    pub fn build(&self) -> ComparisonAnalytics {
        let metrics = Metric::ALL
            .into_iter()
            .map(|metric| MetricWeight {
                metric,
                weight: self.weight(metric),
            })
            .filter(|entry| entry.weight > 0.0)
            .collect();
        ComparisonAnalytics::new(metrics).with_throughput_chart_scale(self.throughput_chart_scale)
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        for (metric, weight) in &self.analytics.weights {
            metric.parse::<Metric>()?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidWeight {
                    metric: metric.clone(),
                    weight: *weight,
                });
            }
        }
        if Metric::ALL
            .into_iter()
            .all(|metric| self.analytics.weight(metric) == 0.0)
        {
            return Err(Error::ZeroWeights);
        }
        let scale = self.analytics.throughput_chart_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidChartScale(scale));
        }
        if self.session.time_quantum == 0 {
            return Err(Error::InvalidTimeQuantum);
        }
        if self.session.step_interval_ms == 0 {
            return Err(Error::InvalidStepInterval);
        }
        Ok(())
    }

    /// Configuration applied to the default algorithm selection.
    pub fn default_algorithm_config(&self) -> AlgorithmConfig {
        self.algorithm_config_for(self.session.default_algorithm)
    }

    pub fn algorithm_config_for(&self, algorithm: Algorithm) -> AlgorithmConfig {
        AlgorithmConfig {
            time_quantum: algorithm
                .uses_time_quantum()
                .then_some(self.session.time_quantum),
        }
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            ordering: self.reconciler.ordering,
            id_salt: self.reconciler.id_salt,
            default_algorithm: self.session.default_algorithm,
            default_config: self.default_algorithm_config(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<DashboardConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    let config: DashboardConfig = match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err)))?,
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err)))?,
        "" => return Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => return Err(Error::UnsupportedConfigFormat(ext.to_string())),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_all_sections() {
        let config: DashboardConfig = toml::from_str(
            r#"
[reconciler]
ordering = "sequenced"
id_salt = 42

[session]
default_algorithm = "round-robin"
time_quantum = 4
step_interval_ms = 250

[analytics]
throughput_chart_scale = 10.0

[analytics.weights]
avg-waiting-time = 2.0
throughput = 0.0
"#,
        )
        .unwrap();

        assert_eq!(config.reconciler.ordering, OrderingPolicy::Sequenced);
        assert_eq!(config.reconciler.id_salt, Some(42));
        assert_eq!(config.session.default_algorithm, Algorithm::RoundRobin);
        assert_eq!(config.default_algorithm_config().time_quantum, Some(4));
        assert_eq!(config.analytics.weight(Metric::AvgWaitingTime), 2.0);
        assert_eq!(config.analytics.weight(Metric::CpuUtilization), 1.0);

        let analytics = config.analytics.build();
        assert_eq!(analytics.metrics().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.default_algorithm_config().time_quantum, None);
        assert_eq!(config.analytics.build().metrics().len(), 5);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = DashboardConfig::default();
        config
            .analytics
            .weights
            .insert("throughput".to_string(), -1.0);
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "metric weight must be finite and >= 0 (got -1 for 'throughput')"
        );
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let mut config = DashboardConfig::default();
        for metric in Metric::ALL {
            config.analytics.weights.insert(metric.to_string(), 0.0);
        }
        assert!(matches!(config.validate(), Err(Error::ZeroWeights)));
    }

    #[test]
    fn unknown_metric_weight_is_rejected() {
        let mut config = DashboardConfig::default();
        config.analytics.weights.insert("latency".to_string(), 1.0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "unknown metric 'latency'");
    }

    #[test]
    fn zero_quantum_is_rejected() {
        let mut config = DashboardConfig::default();
        config.session.time_quantum = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidTimeQuantum)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let path = std::env::temp_dir().join("sched-dash-config-test.yaml");
        fs::write(&path, "x: 1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.to_string(), "unsupported config format 'yaml'");
    }
}
