//! Signal input and transport collaborators.
//!
//! This module defines the sample sources the orchestrator pulls from and
//! the channels it exchanges commands and telemetry over.

pub mod channel;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelClosed, CommandChannel, NoCommands, SinkError, TelemetrySink};
pub use source::{ReplaySource, SignalSource, SimulatedSource};
pub use types::{CommandError, ControlAction, ControlCommand, SampleChunk};
