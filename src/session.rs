use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analytics::{ComparisonAnalytics, Comparison};
use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::events::{
    ClientCommand, CompletedRun, DetailedPatch, Incoming, ServerEvent, StepUpdate,
};
use crate::ids::IdGenerator;
use crate::models::{
    Algorithm, AlgorithmConfig, Process, RawProcess, SimulationStatus,
};
use crate::reconciler::{MergeReport, StateReconciler};
use crate::state::{AlgorithmRunResult, SimulationSnapshot};
use crate::store::ResultStore;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub algorithm: Algorithm,
    pub processes: Vec<Process>,
    pub config: AlgorithmConfig,
}

/// One-shot request/response channel to the simulation service.
pub trait BatchBackend {
    /// Returns the raw completion payload (`{results, statistics}`).
    fn run(&self, request: &BatchRequest) -> Result<Value>;
}

/// Outbound half of the streaming channel. Inbound events are handed to
/// [`Session::deliver`] together with the token issued on attach.
pub trait StreamTransport {
    fn send(&mut self, command: &ClientCommand) -> Result<()>;
    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamToken(u64);

struct ActiveStream {
    token: StreamToken,
    transport: Box<dyn StreamTransport>,
}

/// Per-UI-session state container: one reconciler, one result store, and at
/// most one live stream.
pub struct Session {
    reconciler: StateReconciler,
    store: ResultStore,
    analytics: ComparisonAnalytics,
    config: DashboardConfig,
    run_ids: IdGenerator,
    stream: Option<ActiveStream>,
    next_token: u64,
    step_interval_ms: u64,
    status_message: Option<String>,
}

impl Session {
    pub fn new(config: DashboardConfig) -> Self {
        let reconciler = StateReconciler::new(config.reconciler_options());
        let run_ids = match config.reconciler.id_salt {
            Some(salt) => IdGenerator::new(salt),
            None => IdGenerator::from_entropy(),
        };
        Self {
            reconciler,
            store: ResultStore::new(),
            analytics: config.analytics.build(),
            step_interval_ms: config.session.step_interval_ms,
            config,
            run_ids,
            stream: None,
            next_token: 1,
            status_message: None,
        }
    }

    pub fn snapshot(&self) -> Arc<SimulationSnapshot> {
        self.reconciler.snapshot()
    }

    pub fn results(&self) -> Arc<Vec<AlgorithmRunResult>> {
        self.store.runs()
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn step_interval_ms(&self) -> u64 {
        self.step_interval_ms
    }

    pub fn compare(&self) -> Comparison {
        self.analytics.compare(&self.store.runs())
    }

    /// Round-robin selections without a quantum get the configured one.
    pub fn select_algorithm(&mut self, algorithm: Algorithm, mut config: AlgorithmConfig) {
        if config.time_quantum.is_none() {
            config.time_quantum = self.config.algorithm_config_for(algorithm).time_quantum;
        }
        info!(%algorithm, "selecting algorithm");
        self.reconciler.set_algorithm(algorithm, config);
    }

    pub fn set_processes(&mut self, processes: Vec<RawProcess>) {
        self.reconciler.set_processes(processes);
    }

    pub fn clear_results(&mut self) {
        self.store.clear();
    }

    pub fn run_batch(&mut self, backend: &dyn BatchBackend) {
        let snapshot = self.reconciler.snapshot();
        let request = BatchRequest {
            algorithm: snapshot.algorithm,
            processes: snapshot.processes.clone(),
            config: snapshot.algorithm_config.clone(),
        };
        info!(algorithm = %request.algorithm, processes = request.processes.len(), "running batch simulation");

        match backend.run(&request) {
            Ok(payload) => {
                self.complete(&payload);
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    /// Tears down any live stream before handing out a new token.
    pub fn attach_stream(&mut self, transport: Box<dyn StreamTransport>) -> StreamToken {
        self.detach_stream();
        let token = StreamToken(self.next_token);
        self.next_token += 1;
        self.stream = Some(ActiveStream { token, transport });
        debug!(token = token.0, "stream attached");
        token
    }

    pub fn detach_stream(&mut self) {
        if let Some(mut active) = self.stream.take() {
            active.transport.close();
            debug!(token = active.token.0, "stream torn down");
        }
    }

    pub fn is_attached(&self, token: StreamToken) -> bool {
        self.stream
            .as_ref()
            .map_or(false, |active| active.token == token)
    }

    /// Returns `false` when the event belongs to a torn-down stream.
    pub fn deliver(&mut self, token: StreamToken, event: ServerEvent) -> bool {
        if !self.is_attached(token) {
            debug!(token = token.0, "ignoring event from stale stream");
            return false;
        }
        match event {
            ServerEvent::Step(update) => {
                self.reconciler.apply_step(update);
            }
            ServerEvent::Completed(payload) => {
                self.complete(&payload);
            }
            ServerEvent::Error(message) => self.fail(message),
            ServerEvent::State(change) => {
                self.reconciler.set_status(change.status);
                if let Some(tick_speed) = change.tick_speed {
                    self.step_interval_ms = tick_speed;
                }
            }
        }
        true
    }

    pub fn start(&mut self) -> Result<bool> {
        let snapshot = self.reconciler.snapshot();
        let command = ClientCommand::Start {
            algorithm: snapshot.algorithm,
            processes: snapshot.processes.clone(),
            step_interval_ms: self.step_interval_ms,
            config: snapshot.algorithm_config.clone(),
        };
        let sent = self.send(command)?;
        if sent {
            self.status_message = None;
            self.reconciler.set_status(SimulationStatus::Running);
        }
        Ok(sent)
    }

    pub fn pause(&mut self) -> Result<bool> {
        let sent = self.send(ClientCommand::Pause)?;
        if sent {
            self.reconciler.set_status(SimulationStatus::Paused);
        }
        Ok(sent)
    }

    pub fn resume(&mut self) -> Result<bool> {
        let sent = self.send(ClientCommand::Resume)?;
        if sent {
            self.reconciler.set_status(SimulationStatus::Running);
        }
        Ok(sent)
    }

    pub fn step(&mut self) -> Result<bool> {
        self.send(ClientCommand::Step)
    }

    /// The local snapshot resets even when the command cannot be sent.
    pub fn reset(&mut self) -> Result<bool> {
        let sent = self.send(ClientCommand::Reset);
        self.reconciler.reset();
        sent
    }

    pub fn change_tick_speed(&mut self, step_interval_ms: u64) -> Result<bool> {
        if step_interval_ms == 0 {
            return Err(Error::InvalidStepInterval);
        }
        self.step_interval_ms = step_interval_ms;
        self.send(ClientCommand::ChangeTickSpeed { step_interval_ms })
    }

    fn send(&mut self, command: ClientCommand) -> Result<bool> {
        let active = self.stream.as_mut().ok_or(Error::NoActiveStream)?;
        match active.transport.send(&command) {
            Ok(()) => Ok(true),
            Err(err) => {
                self.fail(err.to_string());
                Ok(false)
            }
        }
    }

    fn fail(&mut self, message: String) {
        warn!(%message, "simulation failed");
        self.status_message = Some(message);
        self.reconciler.set_status(SimulationStatus::Idle);
    }

    /// Validates a completion payload, applies it to the snapshot and stores
    /// the run. A malformed payload is dropped without touching either.
    fn complete(&mut self, payload: &Value) -> Option<MergeReport> {
        let run = match CompletedRun::from_value(payload) {
            Ok(run) => run,
            Err(err) => {
                warn!(error = %err, "dropping malformed completion");
                return None;
            }
        };

        let algorithm = run
            .algorithm
            .unwrap_or_else(|| self.reconciler.snapshot().algorithm);
        let processes = self.reconciler.sanitize_list(run.results);
        let as_raw = || processes.iter().cloned().map(RawProcess::from).collect::<Vec<_>>();
        let update = StepUpdate {
            current_time: match run.statistics.total_time {
                Incoming::Present(total_time) if total_time > 0 => Incoming::Present(total_time),
                _ => Incoming::Absent,
            },
            processes: Incoming::Present(as_raw()),
            ready_queue: Incoming::Present(Vec::new()),
            waiting_queue: Incoming::Present(Vec::new()),
            running: Incoming::Present(None),
            completed: Incoming::Present(as_raw()),
            statistics: Incoming::Present(run.statistics.clone()),
            detailed_metrics: run
                .detailed_metrics
                .as_ref()
                .map_or(Incoming::Absent, |metrics| {
                    Incoming::Present(DetailedPatch::from(metrics))
                }),
            ..StepUpdate::default()
        };
        let report = self.reconciler.apply_step(update);
        self.reconciler.set_status(SimulationStatus::Completed);
        self.status_message = None;

        self.store.add_result(AlgorithmRunResult {
            id: self.run_ids.next_id("run"),
            algorithm,
            processes,
            statistics: run.statistics.to_statistics(),
            detailed_metrics: run.detailed_metrics,
            completed_at_ms: run.completed_at_ms.unwrap_or_else(now_ms),
            unreported: run.statistics.unreported_metrics(),
        });
        Some(report)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach_stream();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
