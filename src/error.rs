use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("metric weight must be finite and >= 0 (got {weight} for '{metric}')")]
    InvalidWeight { metric: String, weight: f64 },
    #[error("metric weights must not all be zero")]
    ZeroWeights,
    #[error("throughput chart scale must be finite and > 0 (got {0})")]
    InvalidChartScale(f64),
    #[error("time quantum must be > 0")]
    InvalidTimeQuantum,
    #[error("step interval must be > 0ms")]
    InvalidStepInterval,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("invalid event on line {line}: {reason}")]
    InvalidEvent { line: usize, reason: String },
    #[error("no active stream")]
    NoActiveStream,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{0}")]
    RunsIo(String),
    #[error("{0}")]
    EventsIo(String),
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
}

pub type Result<T> = std::result::Result<T, Error>;
