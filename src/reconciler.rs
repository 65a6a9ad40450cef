use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::{FieldMerge, Incoming, StepUpdate};
use crate::ids::IdGenerator;
use crate::models::{Algorithm, AlgorithmConfig, Process, ProcessState, RawProcess, SimulationStatus};
use crate::state::SimulationSnapshot;

/// How updates carrying a sequence number are ordered.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingPolicy {
    /// Every update merges; the last call wins per field.
    #[default]
    LastWriteWins,
    /// Updates whose `seq` is not newer than the last applied one are dropped.
    Sequenced,
}

#[derive(Clone, Debug, Default)]
pub struct ReconcilerOptions {
    pub ordering: OrderingPolicy,
    pub id_salt: Option<u32>,
    pub default_algorithm: Algorithm,
    pub default_config: AlgorithmConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub stale: bool,
    pub applied: Vec<&'static str>,
    pub retained: Vec<&'static str>,
}

impl MergeReport {
    fn record(&mut self, merge: FieldMerge) {
        match merge {
            FieldMerge::Applied(name) => self.applied.push(name),
            FieldMerge::Retained(name) => {
                warn!(field = name, "malformed field, keeping previous value");
                self.retained.push(name);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Partition {
    Running,
    Waiting,
    Ready,
}

/// Owns the canonical snapshot and is the only place it is mutated.
///
/// Every mutation builds a new snapshot and swaps the `Arc`, so a reader
/// holding a previous [`StateReconciler::snapshot`] never sees a torn value.
pub struct StateReconciler {
    snapshot: Arc<SimulationSnapshot>,
    ids: IdGenerator,
    ordering: OrderingPolicy,
    last_seq: Option<u64>,
    default_algorithm: Algorithm,
    default_config: AlgorithmConfig,
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new(ReconcilerOptions::default())
    }
}

impl StateReconciler {
    pub fn new(options: ReconcilerOptions) -> Self {
        let ids = match options.id_salt {
            Some(salt) => IdGenerator::new(salt),
            None => IdGenerator::from_entropy(),
        };
        Self {
            snapshot: Arc::new(SimulationSnapshot::initial(
                options.default_algorithm,
                options.default_config.clone(),
            )),
            ids,
            ordering: options.ordering,
            last_seq: None,
            default_algorithm: options.default_algorithm,
            default_config: options.default_config,
        }
    }

    pub fn snapshot(&self) -> Arc<SimulationSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn ordering(&self) -> OrderingPolicy {
        self.ordering
    }

    pub fn apply_step(&mut self, update: StepUpdate) -> MergeReport {
        let mut report = MergeReport::default();

        if let (OrderingPolicy::Sequenced, Some(seq), Some(last)) =
            (self.ordering, update.seq, self.last_seq)
        {
            if seq <= last {
                debug!(seq, last, "dropping stale update");
                report.stale = true;
                return report;
            }
        }

        let mut next = (*self.snapshot).clone();
        let mut fresh = Vec::new();

        match update.current_time {
            Incoming::Absent => {}
            Incoming::Present(time) if time >= next.current_time => {
                next.current_time = time;
                report.applied.push("currentTime");
            }
            Incoming::Present(time) => {
                debug!(
                    incoming = time,
                    current = next.current_time,
                    "ignoring time regression"
                );
                report.retained.push("currentTime");
            }
            Incoming::Malformed => report.record(FieldMerge::Retained("currentTime")),
        }

        if let Some(list) = self.merge_list(update.processes, "processes", &mut report) {
            next.processes = list;
        }
        if let Some(list) = self.merge_list(update.ready_queue, "readyQueue", &mut report) {
            next.ready_queue = list;
            fresh.push(Partition::Ready);
        }
        if let Some(list) = self.merge_list(update.waiting_queue, "waitingQueue", &mut report) {
            next.waiting_queue = list;
            fresh.push(Partition::Waiting);
        }
        match update.running {
            Incoming::Absent => {}
            Incoming::Present(slot) => {
                next.running = slot.map(|raw| {
                    let mut process = self.sanitize_process(raw);
                    process.progress = Some(progress_percent(
                        process.burst_time,
                        process.remaining_time,
                    ));
                    process
                });
                fresh.push(Partition::Running);
                report.applied.push("runningProcess");
            }
            Incoming::Malformed => report.record(FieldMerge::Retained("runningProcess")),
        }
        if let Some(list) = self.merge_list(update.completed, "completedProcesses", &mut report) {
            next.completed = list;
        }

        match update.statistics {
            Incoming::Absent => {}
            Incoming::Present(patch) => {
                patch.apply_to(&mut next.statistics, |merge| report.record(merge));
            }
            Incoming::Malformed => report.record(FieldMerge::Retained("statistics")),
        }
        match update.detailed_metrics {
            Incoming::Absent => {}
            Incoming::Present(patch) => {
                let mut metrics = next.detailed_metrics.take().unwrap_or_default();
                patch.apply_to(&mut metrics, |merge| report.record(merge));
                next.detailed_metrics = Some(metrics);
            }
            Incoming::Malformed => report.record(FieldMerge::Retained("detailedMetrics")),
        }

        enforce_partitions(&mut next, &fresh);
        if next.status != SimulationStatus::Running && next.running.take().is_some() {
            debug!(status = %next.status, "clearing running slot outside running status");
        }

        if let Some(seq) = update.seq {
            self.last_seq = Some(self.last_seq.map_or(seq, |last| last.max(seq)));
        }
        self.snapshot = Arc::new(next);
        report
    }

    /// Guarantees a non-empty id and leaves every other field as reported.
    pub fn sanitize_process(&mut self, raw: RawProcess) -> Process {
        sanitize_process(raw, &mut self.ids)
    }

    pub fn sanitize_list(&mut self, raws: Vec<RawProcess>) -> Vec<Process> {
        sanitize_list(raws, &mut self.ids)
    }

    /// Switching mid-simulation is allowed; gating is the caller's concern.
    pub fn set_algorithm(&mut self, algorithm: Algorithm, config: AlgorithmConfig) {
        self.mutate(|snapshot| {
            snapshot.algorithm = algorithm;
            snapshot.algorithm_config = config;
        });
    }

    pub fn set_processes(&mut self, processes: Vec<RawProcess>) {
        let processes = self.sanitize_list(processes);
        self.mutate(|snapshot| snapshot.processes = processes);
    }

    /// Records the status as told; transition legality is not checked here.
    pub fn set_status(&mut self, status: SimulationStatus) {
        self.mutate(|snapshot| {
            snapshot.status = status;
            if status != SimulationStatus::Running {
                snapshot.running = None;
            }
        });
    }

    pub fn reset(&mut self) {
        self.snapshot = Arc::new(SimulationSnapshot::initial(
            self.default_algorithm,
            self.default_config.clone(),
        ));
        self.last_seq = None;
    }

    fn mutate(&mut self, apply: impl FnOnce(&mut SimulationSnapshot)) {
        let mut next = (*self.snapshot).clone();
        apply(&mut next);
        self.snapshot = Arc::new(next);
    }

    fn merge_list(
        &mut self,
        incoming: Incoming<Vec<RawProcess>>,
        name: &'static str,
        report: &mut MergeReport,
    ) -> Option<Vec<Process>> {
        match incoming {
            Incoming::Absent => None,
            Incoming::Present(list) => {
                report.applied.push(name);
                Some(self.sanitize_list(list))
            }
            Incoming::Malformed => {
                report.record(FieldMerge::Retained(name));
                None
            }
        }
    }
}

pub fn sanitize_process(raw: RawProcess, ids: &mut IdGenerator) -> Process {
    let id = match raw.id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => ids.next_id("p"),
    };
    Process::with_id(raw, id)
}

/// Sanitizes a list; a repeated id inside the list is a collision and the
/// later entry gets a synthesized id.
pub fn sanitize_list(raws: Vec<RawProcess>, ids: &mut IdGenerator) -> Vec<Process> {
    let mut seen = HashSet::new();
    raws.into_iter()
        .map(|raw| {
            let mut process = sanitize_process(raw, ids);
            if !seen.insert(process.id.clone()) {
                let replacement = ids.next_id("p");
                debug!(id = %process.id, %replacement, "duplicate process id");
                process.id = replacement;
                seen.insert(process.id.clone());
            }
            process
        })
        .collect()
}

/// Share of the burst already executed, in `[0, 100]`.
pub fn progress_percent(burst_time: u64, remaining_time: u64) -> f64 {
    if burst_time == 0 {
        return 0.0;
    }
    let done = burst_time.saturating_sub(remaining_time) as f64;
    (done / burst_time as f64 * 100.0).clamp(0.0, 100.0)
}

/// Restores the partition invariants after a merge: terminated processes
/// move to completed, completed ids leave the active partitions, and an id
/// sits in at most one of running, waiting and ready. Partitions replaced by
/// this merge win over stale ones.
fn enforce_partitions(snapshot: &mut SimulationSnapshot, fresh: &[Partition]) {
    let mut completed_ids: HashSet<String> = HashSet::new();
    snapshot
        .completed
        .retain(|process| completed_ids.insert(process.id.clone()));

    let terminated = snapshot
        .running
        .iter()
        .chain(snapshot.waiting_queue.iter())
        .chain(snapshot.ready_queue.iter())
        .filter(|process| process.state == ProcessState::Terminated)
        .cloned()
        .collect::<Vec<_>>();
    for process in terminated {
        if completed_ids.insert(process.id.clone()) {
            snapshot.completed.push(process);
        }
    }

    let mut order = [Partition::Running, Partition::Waiting, Partition::Ready];
    order.sort_by_key(|partition| !fresh.contains(partition));

    let mut claimed = completed_ids;
    for partition in order {
        match partition {
            Partition::Running => {
                let taken = snapshot
                    .running
                    .as_ref()
                    .map_or(false, |process| !claimed.insert(process.id.clone()));
                if taken {
                    snapshot.running = None;
                }
            }
            Partition::Waiting => snapshot
                .waiting_queue
                .retain(|process| claimed.insert(process.id.clone())),
            Partition::Ready => snapshot
                .ready_queue
                .retain(|process| claimed.insert(process.id.clone())),
        }
    }
}
