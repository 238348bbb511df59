//! Fixed-rate session loop.
//!
//! One `StreamOrchestrator` drives one session: each tick it polls for
//! control commands within a bounded budget, waits out the rest of the tick,
//! pulls a chunk from the signal source and runs
//! spectral -> classifier -> safety -> planner before emitting a frame.
//! Only the command poll and the cadence sleep suspend; every stage is
//! synchronous.

use crate::config::{Config, ConfigError};
use crate::core::actuation::ActuationPlanner;
use crate::core::classifier::{CognitiveState, StateClassifier};
use crate::core::safety::ActuationContext;
use crate::core::spectral::{SpectralError, SpectralProcessor};
use crate::core::telemetry::{TelemetryBuilder, TelemetryFrame};
use crate::devices::DeviceHandle;
use crate::signal::{
    ChannelClosed, CommandChannel, ControlCommand, SampleChunk, SignalSource, SinkError,
    TelemetrySink,
};
use crate::transparency::{create_shared_log, BandLogger, NullBandLogger, SharedAuditLog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Pause between command polls while the poll budget lasts.
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Lifecycle of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, loop not started
    Idle,
    /// Streaming without band logging
    NotRecording,
    /// Streaming and logging bands under `session_id`
    Recording { session_id: String },
    /// Terminal
    Closed,
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::NotRecording | SessionState::Recording { .. })
    }

    pub fn recording_id(&self) -> Option<&str> {
        match self {
            SessionState::Recording { session_id } => Some(session_id),
            _ => None,
        }
    }
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    CommandChannelClosed,
    SinkDisconnected,
    SourceExhausted,
}

/// Per-session totals returned when the loop ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub label: String,
    pub reason: CloseReason,
    pub ticks: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub commands_ignored: u64,
}

/// Unrecoverable session errors.
#[derive(Debug)]
pub enum StreamError {
    Config(ConfigError),
    Spectral(SpectralError),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Config(e) => write!(f, "Invalid configuration: {e}"),
            StreamError::Spectral(e) => write!(f, "Spectral processing failed: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<ConfigError> for StreamError {
    fn from(e: ConfigError) -> Self {
        StreamError::Config(e)
    }
}

impl From<SpectralError> for StreamError {
    fn from(e: SpectralError) -> Self {
        StreamError::Spectral(e)
    }
}

/// Drives one session over a signal source, a command channel and a sink.
pub struct StreamOrchestrator<S, C, T> {
    label: String,
    tick_duration: Duration,
    poll_budget: Duration,
    source: S,
    commands: C,
    sink: T,
    processor: SpectralProcessor,
    classifier: StateClassifier,
    planner: ActuationPlanner,
    devices: DeviceHandle,
    telemetry: TelemetryBuilder,
    band_logger: Arc<dyn BandLogger>,
    audit: SharedAuditLog,
    state: SessionState,
    ticks: u64,
    frames_sent: u64,
    frames_dropped: u64,
    commands_ignored: u64,
}

impl<S, C, T> StreamOrchestrator<S, C, T>
where
    S: SignalSource,
    C: CommandChannel,
    T: TelemetrySink,
{
    /// Build a session. Fails on configuration the pipeline cannot run with.
    pub fn new(
        config: &Config,
        source: S,
        commands: C,
        sink: T,
        devices: DeviceHandle,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let processor = SpectralProcessor::from_config(config)?;
        let telemetry = TelemetryBuilder::new();

        Ok(Self {
            label: telemetry.instance_id().to_string(),
            tick_duration: config.tick_duration,
            poll_budget: config.command_poll_budget,
            source,
            commands,
            sink,
            processor,
            classifier: StateClassifier::new(),
            planner: ActuationPlanner::default(),
            devices,
            telemetry,
            band_logger: Arc::new(NullBandLogger),
            audit: create_shared_log(),
            state: SessionState::Idle,
            ticks: 0,
            frames_sent: 0,
            frames_dropped: 0,
            commands_ignored: 0,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_band_logger(mut self, logger: Arc<dyn BandLogger>) -> Self {
        self.band_logger = logger;
        self
    }

    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_classifier(mut self, classifier: StateClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_planner(mut self, planner: ActuationPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn devices(&self) -> &DeviceHandle {
        &self.devices
    }

    /// Run one tick's processing on a chunk. Never suspends.
    pub fn step(&mut self, chunk: &SampleChunk) -> Result<TelemetryFrame, StreamError> {
        let bands = self.processor.process(&chunk.samples)?;
        let classification = self.classifier.classify(&bands);

        let context = ActuationContext {
            stress: classification.level_of(CognitiveState::Stress),
            fatigue: classification.level_of(CognitiveState::Fatigue),
            focus: classification.level_of(CognitiveState::Focus),
        };
        let verdict = self.devices.safety.verdict(chunk.quality, &context);
        if !verdict.signal_ok {
            self.audit.record_safety_lockout();
        }

        let intent = self.planner.plan(&classification, &verdict);
        self.devices.board.apply(&intent, &self.label);

        if let Some(session_id) = self.state.recording_id() {
            self.band_logger.log_bands(session_id, &bands, chunk.quality);
        }

        self.ticks += 1;
        self.audit.record_tick();

        let recording = self.state.recording_id();
        Ok(self
            .telemetry
            .build(chunk, bands, classification, &intent, &verdict, recording))
    }

    /// Apply one raw control message. Bad messages are logged and ignored.
    pub fn handle_command(&mut self, raw: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        let command = match ControlCommand::parse(raw) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(session = %self.label, error = %e, "Ignoring control command");
                self.commands_ignored += 1;
                self.audit.record_command_ignored();
                return;
            }
        };

        match command {
            ControlCommand::StartLog { session_id } => {
                tracing::info!(session = %self.label, recording = %session_id, "Recording started");
                self.state = SessionState::Recording { session_id };
            }
            ControlCommand::StopLog => {
                if self.state.recording_id().is_some() {
                    tracing::info!(session = %self.label, "Recording stopped");
                }
                self.state = SessionState::NotRecording;
            }
        }
    }

    /// Handle commands for at most the poll budget. Anything still queued
    /// waits for the next tick.
    async fn poll_commands(&mut self) -> Result<(), ChannelClosed> {
        let deadline = Instant::now() + self.poll_budget;
        loop {
            let received = self.commands.try_receive()?;
            if let Some(raw) = &received {
                self.handle_command(raw);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            if received.is_none() {
                tokio::time::sleep(COMMAND_POLL_INTERVAL.min(deadline - now)).await;
            }
        }
    }

    /// Run until the transport goes away or the source is exhausted.
    pub async fn run(&mut self) -> Result<SessionSummary, StreamError> {
        self.state = SessionState::NotRecording;
        tracing::info!(
            session = %self.label,
            tick_ms = self.tick_duration.as_millis() as u64,
            "Session streaming"
        );

        let reason = loop {
            let tick_start = Instant::now();

            if self.poll_commands().await.is_err() {
                break CloseReason::CommandChannelClosed;
            }

            tokio::time::sleep_until(tick_start + self.tick_duration).await;

            let Some(chunk) = self.source.next_chunk(self.tick_duration) else {
                break CloseReason::SourceExhausted;
            };

            let frame = match self.step(&chunk) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(session = %self.label, error = %e, "Session aborted");
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            };

            match self.sink.send(frame) {
                Ok(()) => {
                    self.frames_sent += 1;
                    self.audit.record_frame_emitted();
                }
                Err(SinkError::Full) => {
                    tracing::warn!(session = %self.label, "Telemetry sink full, frame dropped");
                    self.frames_dropped += 1;
                    self.audit.record_frame_dropped();
                }
                Err(SinkError::Disconnected) => break CloseReason::SinkDisconnected,
            }
        };

        self.state = SessionState::Closed;
        tracing::info!(session = %self.label, ?reason, ticks = self.ticks, "Session closed");

        Ok(SessionSummary {
            label: self.label.clone(),
            reason,
            ticks: self.ticks,
            frames_sent: self.frames_sent,
            frames_dropped: self.frames_dropped,
            commands_ignored: self.commands_ignored,
        })
    }
}
