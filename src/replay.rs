//! Offline driver that feeds a recorded session through [`Session`].
//!
//! Each non-blank line is JSON. Server traffic uses the stream envelope
//! (`{"event": "step", "payload": {...}}`); user actions use a `command` key
//! (`{"command": "select", "algorithm": "sjf"}`).

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{process_list, ClientCommand, ServerEvent};
use crate::models::{count_from, Algorithm, AlgorithmConfig, RawProcess};
use crate::session::{Session, StreamTransport};

#[derive(Clone, Debug, PartialEq)]
pub enum ClientAction {
    Select {
        algorithm: Algorithm,
        config: AlgorithmConfig,
    },
    SetProcesses(Vec<RawProcess>),
    Start,
    Pause,
    Resume,
    Step,
    Reset,
    ChangeTickSpeed(u64),
    ClearResults,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReplayLine {
    Server(ServerEvent),
    Client(ClientAction),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub actions: usize,
}

/// Accepts every command; a replay has no live service on the other end.
struct ReplayTransport;

impl StreamTransport for ReplayTransport {
    fn send(&mut self, command: &ClientCommand) -> Result<()> {
        debug!(?command, "replay command");
        Ok(())
    }

    fn close(&mut self) {}
}

pub fn parse_events(contents: &str) -> Result<Vec<ReplayLine>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(line, idx + 1))
        .collect()
}

pub fn parse_line(line: &str, number: usize) -> Result<ReplayLine> {
    let invalid = |reason: String| Error::InvalidEvent {
        line: number,
        reason,
    };
    let value: Value = serde_json::from_str(line).map_err(|err| invalid(err.to_string()))?;

    if value.get("event").is_some() {
        return ServerEvent::from_envelope(&value)
            .map(ReplayLine::Server)
            .map_err(|err| invalid(err.to_string()));
    }

    let command = value
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("expected an 'event' or 'command' key".to_string()))?;
    let action = match command {
        "select" => {
            let algorithm = value
                .get("algorithm")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("select without algorithm".to_string()))?
                .parse::<Algorithm>()
                .map_err(|err| invalid(err.to_string()))?;
            let config = match value.get("config") {
                Some(config) => serde_json::from_value(config.clone())
                    .map_err(|err| invalid(format!("invalid config: {}", err)))?,
                None => AlgorithmConfig::default(),
            };
            ClientAction::Select { algorithm, config }
        }
        "processes" => {
            let processes = value
                .get("processes")
                .and_then(process_list)
                .ok_or_else(|| invalid("processes must be an array of objects".to_string()))?;
            ClientAction::SetProcesses(processes)
        }
        "start" => ClientAction::Start,
        "pause" => ClientAction::Pause,
        "resume" => ClientAction::Resume,
        "step" => ClientAction::Step,
        "reset" => ClientAction::Reset,
        "tick-speed" => {
            let interval = value
                .get("stepIntervalMs")
                .and_then(count_from)
                .ok_or_else(|| invalid("tick-speed without stepIntervalMs".to_string()))?;
            ClientAction::ChangeTickSpeed(interval)
        }
        "clear-results" => ClientAction::ClearResults,
        other => return Err(invalid(format!("unknown command '{}'", other))),
    };
    Ok(ReplayLine::Client(action))
}

pub fn replay(session: &mut Session, lines: Vec<ReplayLine>) -> Result<ReplaySummary> {
    let token = session.attach_stream(Box::new(ReplayTransport));
    let mut summary = ReplaySummary::default();

    for line in lines {
        match line {
            ReplayLine::Server(event) => {
                session.deliver(token, event);
                summary.events += 1;
            }
            ReplayLine::Client(action) => {
                apply_action(session, action)?;
                summary.actions += 1;
            }
        }
    }

    session.detach_stream();
    Ok(summary)
}

fn apply_action(session: &mut Session, action: ClientAction) -> Result<()> {
    match action {
        ClientAction::Select { algorithm, config } => session.select_algorithm(algorithm, config),
        ClientAction::SetProcesses(processes) => session.set_processes(processes),
        ClientAction::Start => {
            session.start()?;
        }
        ClientAction::Pause => {
            session.pause()?;
        }
        ClientAction::Resume => {
            session.resume()?;
        }
        ClientAction::Step => {
            session.step()?;
        }
        ClientAction::Reset => {
            session.reset()?;
        }
        ClientAction::ChangeTickSpeed(interval) => {
            session.change_tick_speed(interval)?;
        }
        ClientAction::ClearResults => session.clear_results(),
    }
    Ok(())
}
