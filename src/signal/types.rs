//! Sample chunks and control commands exchanged with the orchestrator.

use serde::{Deserialize, Serialize};

/// Samples delivered by a signal source for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleChunk {
    /// Raw samples in arrival order
    pub samples: Vec<f64>,
    /// Source-reported signal quality in percent
    pub quality: f64,
}

impl SampleChunk {
    pub fn new(samples: Vec<f64>, quality: f64) -> Self {
        Self { samples, quality }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Action carried by a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    StartLog,
    StopLog,
}

/// Inbound command that toggles band logging for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    StartLog { session_id: String },
    StopLog,
}

impl ControlCommand {
    pub fn start_log(session_id: impl Into<String>) -> Self {
        ControlCommand::StartLog {
            session_id: session_id.into(),
        }
    }

    pub fn stop_log() -> Self {
        ControlCommand::StopLog
    }

    pub fn action(&self) -> ControlAction {
        match self {
            ControlCommand::StartLog { .. } => ControlAction::StartLog,
            ControlCommand::StopLog => ControlAction::StopLog,
        }
    }

    /// Parse a JSON command such as `{"action": "start_log", "session_id": "abc"}`.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| CommandError::Malformed(e.to_string()))?;

        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| CommandError::Malformed("missing \"action\" field".to_string()))?;

        match action {
            "start_log" => value
                .get("session_id")
                .and_then(|s| s.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Self::start_log)
                .ok_or(CommandError::MissingSessionId),
            "stop_log" => Ok(Self::stop_log()),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

/// Reasons an inbound command is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Malformed(String),
    UnknownAction(String),
    MissingSessionId,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Malformed(e) => write!(f, "Malformed command: {e}"),
            CommandError::UnknownAction(a) => write!(f, "Unknown command action: {a}"),
            CommandError::MissingSessionId => write!(f, "start_log requires a session_id"),
        }
    }
}

impl std::error::Error for CommandError {}
