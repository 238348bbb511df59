//! Transport-facing collaborators: the inbound command channel and the
//! outbound telemetry sink.
//!
//! Both are polled without blocking so the orchestrator owns all waiting.

use crate::core::telemetry::TelemetryFrame;
use tokio::sync::mpsc;

/// The transport behind a command channel has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

impl std::fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command channel closed")
    }
}

impl std::error::Error for ChannelClosed {}

/// Source of raw (unparsed) control messages.
pub trait CommandChannel: Send {
    /// Return a pending message if one is queued.
    fn try_receive(&mut self) -> Result<Option<String>, ChannelClosed>;
}

impl CommandChannel for mpsc::Receiver<String> {
    fn try_receive(&mut self) -> Result<Option<String>, ChannelClosed> {
        match self.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelClosed),
        }
    }
}

impl CommandChannel for mpsc::UnboundedReceiver<String> {
    fn try_receive(&mut self) -> Result<Option<String>, ChannelClosed> {
        match self.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelClosed),
        }
    }
}

/// A command channel that never carries anything and never closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandChannel for NoCommands {
    fn try_receive(&mut self) -> Result<Option<String>, ChannelClosed> {
        Ok(None)
    }
}

/// Why a frame could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The consumer is behind; the frame was dropped
    Full,
    /// The consumer is gone; the session is over
    Disconnected,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Full => write!(f, "Telemetry sink is full"),
            SinkError::Disconnected => write!(f, "Telemetry sink disconnected"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Consumer of telemetry frames.
pub trait TelemetrySink: Send {
    fn send(&mut self, frame: TelemetryFrame) -> Result<(), SinkError>;
}

impl TelemetrySink for mpsc::Sender<TelemetryFrame> {
    fn send(&mut self, frame: TelemetryFrame) -> Result<(), SinkError> {
        self.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Disconnected,
        })
    }
}

impl TelemetrySink for mpsc::UnboundedSender<TelemetryFrame> {
    fn send(&mut self, frame: TelemetryFrame) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| SinkError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_reports_empty_then_closed() {
        let (tx, mut rx) = mpsc::channel::<String>(4);
        assert_eq!(rx.try_receive(), Ok(None));

        tx.try_send("hello".to_string()).unwrap();
        assert_eq!(rx.try_receive(), Ok(Some("hello".to_string())));

        drop(tx);
        assert_eq!(rx.try_receive(), Err(ChannelClosed));
    }

    #[test]
    fn test_no_commands_never_closes() {
        let mut channel = NoCommands;
        assert_eq!(channel.try_receive(), Ok(None));
    }

    #[test]
    fn test_bounded_sink_reports_full_and_closed() {
        use crate::core::telemetry::TelemetryBuilder;
        use crate::core::{ActuatorIntent, BandPowers, Classification, SafetyVerdict};
        use crate::signal::SampleChunk;

        let mut builder = TelemetryBuilder::new();
        let mut frame = || {
            builder.build(
                &SampleChunk::new(vec![0.0], 95.0),
                BandPowers::default(),
                Classification::unknown(),
                &ActuatorIntent::safe_idle(),
                &SafetyVerdict::clear(),
                None,
            )
        };

        let (mut tx, rx) = mpsc::channel::<TelemetryFrame>(1);
        assert_eq!(TelemetrySink::send(&mut tx, frame()), Ok(()));
        assert_eq!(TelemetrySink::send(&mut tx, frame()), Err(SinkError::Full));

        drop(rx);
        assert_eq!(
            TelemetrySink::send(&mut tx, frame()),
            Err(SinkError::Disconnected)
        );
    }
}
