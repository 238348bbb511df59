//! End-to-end tests for the streaming pipeline

use neurovex_core::config::{Config, DeviceMode};
use neurovex_core::core::{
    BandPowers, CognitiveState, SpectralProcessor, StateClassifier, TelemetryFrame,
};
use neurovex_core::devices::DeviceProvider;
use neurovex_core::orchestrator::{CloseReason, SessionState, StreamOrchestrator};
use neurovex_core::signal::{NoCommands, ReplaySource, SignalSource, SimulatedSource};
use neurovex_core::transparency::{create_shared_log, BandLogger};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn fast_config() -> Config {
    Config {
        tick_duration: Duration::from_millis(20),
        command_poll_budget: Duration::from_millis(5),
        ..Config::default()
    }
}

fn sine(freq: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 10.0 * (2.0 * PI * freq * i as f64 / 250.0).sin())
        .collect()
}

#[derive(Default)]
struct CollectingLogger {
    rows: Mutex<Vec<String>>,
}

impl BandLogger for CollectingLogger {
    fn log_bands(&self, session_id: &str, _bands: &BandPowers, _quality: f64) {
        self.rows.lock().unwrap().push(session_id.to_string());
    }
}

#[test]
fn test_same_samples_give_same_results() {
    let mut source = SimulatedSource::new(250, CognitiveState::Stress).with_seed(42);
    let chunks: Vec<_> = (0..30)
        .map(|_| source.next_chunk(Duration::from_millis(100)).unwrap())
        .collect();

    let run = || {
        let mut processor = SpectralProcessor::new(250, 2).unwrap();
        let classifier = StateClassifier::new();
        chunks
            .iter()
            .map(|chunk| {
                let bands = processor.process(&chunk.samples).unwrap();
                (bands, classifier.classify(&bands))
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_pure_rhythms_land_in_their_bands() {
    let mut processor = SpectralProcessor::new(250, 2).unwrap();
    let bands = processor.process(&sine(10.0, 500)).unwrap();
    assert_eq!(bands.dominant(), neurovex_core::core::Band::Alpha);

    let mut processor = SpectralProcessor::new(250, 2).unwrap();
    let bands = processor.process(&sine(20.0, 500)).unwrap();
    assert_eq!(bands.dominant(), neurovex_core::core::Band::Beta);
}

#[tokio::test]
async fn test_recording_session_logs_every_tick() {
    let config = fast_config();
    let devices = DeviceProvider::from_config(&config, None);
    let logger = Arc::new(CollectingLogger::default());

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<String>();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<TelemetryFrame>();
    cmd_tx
        .send(r#"{"action": "start_log", "session_id": "study-7"}"#.to_string())
        .unwrap();
    cmd_tx.send("{not json".to_string()).unwrap();

    let source = ReplaySource::from_samples(&sine(10.0, 25), 5, 95.0);
    let mut orchestrator =
        StreamOrchestrator::new(&config, source, cmd_rx, frame_tx, devices.for_session("t"))
            .unwrap()
            .with_band_logger(logger.clone());

    let summary = orchestrator.run().await.unwrap();
    drop(cmd_tx);

    assert_eq!(summary.reason, CloseReason::SourceExhausted);
    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.commands_ignored, 1);
    assert_eq!(orchestrator.state(), &SessionState::Closed);
    assert_eq!(logger.rows.lock().unwrap().len(), 5);

    let mut frames = Vec::new();
    while let Ok(frame) = frame_rx.try_recv() {
        frames.push(frame);
    }
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| f.status.recording));
    assert!(frames
        .iter()
        .all(|f| f.session_id.as_deref() == Some("study-7")));
}

#[tokio::test]
async fn test_stop_log_ends_band_logging() {
    let config = fast_config();
    let devices = DeviceProvider::from_config(&config, None);
    let logger = Arc::new(CollectingLogger::default());

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<String>();
    let (frame_tx, _frame_rx) = mpsc::unbounded_channel::<TelemetryFrame>();
    cmd_tx
        .send(r#"{"action": "start_log", "session_id": "s"}"#.to_string())
        .unwrap();
    cmd_tx.send(r#"{"action": "stop_log"}"#.to_string()).unwrap();

    let source = ReplaySource::from_samples(&sine(10.0, 15), 5, 95.0);
    let mut orchestrator =
        StreamOrchestrator::new(&config, source, cmd_rx, frame_tx, devices.for_session("t"))
            .unwrap()
            .with_band_logger(logger.clone());

    orchestrator.run().await.unwrap();
    drop(cmd_tx);
    assert!(logger.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_receiver_closes_session() {
    let config = fast_config();
    let devices = DeviceProvider::from_config(&config, None);
    let (frame_tx, mut frame_rx) = mpsc::channel::<TelemetryFrame>(8);

    let source = SimulatedSource::from_config(&config).with_seed(1);
    let mut orchestrator =
        StreamOrchestrator::new(&config, source, NoCommands, frame_tx, devices.for_session("t"))
            .unwrap();
    let session = tokio::spawn(async move { orchestrator.run().await });

    assert!(frame_rx.recv().await.is_some());
    assert!(frame_rx.recv().await.is_some());
    drop(frame_rx);

    let summary = tokio::time::timeout(Duration::from_secs(2), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, CloseReason::SinkDisconnected);
    assert!(summary.frames_sent >= 2);
}

#[tokio::test]
async fn test_shared_emergency_stop_locks_every_session() {
    let config = Config {
        device_mode: DeviceMode::Shared,
        ..fast_config()
    };
    let audit = create_shared_log();
    let devices = DeviceProvider::from_config(&config, Some(audit.clone()));

    let (tx_a, mut rx_a) = mpsc::unbounded_channel::<TelemetryFrame>();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel::<TelemetryFrame>();
    let mut a = StreamOrchestrator::new(
        &config,
        ReplaySource::from_samples(&sine(20.0, 10), 5, 99.0),
        NoCommands,
        tx_a,
        devices.for_session("a"),
    )
    .unwrap();
    let mut b = StreamOrchestrator::new(
        &config,
        ReplaySource::from_samples(&sine(20.0, 10), 5, 99.0),
        NoCommands,
        tx_b,
        devices.for_session("b"),
    )
    .unwrap();

    assert_eq!(devices.emergency_stop_all(), 1);
    a.run().await.unwrap();
    b.run().await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        while let Ok(frame) = rx.try_recv() {
            assert!(frame.status.emergency_stop);
            assert!(frame.status.safety_lock);
            assert_eq!(frame.hardware.car.speed, 0);
        }
    }
    assert_eq!(audit.stats().emergency_stops, 1);
}
