//! Neurovex Core - real-time EEG band analysis with safety-gated actuation.
//!
//! This library turns a stream of single-channel EEG samples into band
//! powers, classifies a cognitive state from them with fixed rules, and maps
//! that state to light and vehicle intents behind a safety gate.
//!
//! # Safety Model
//!
//! - **Signal quality gate**: actuator output is only trusted above the quality threshold
//! - **Emergency stop**: a latch that blocks all actuation until explicitly reset
//! - **Fatigue lockout**: the vehicle stops when fatigue exceeds its threshold
//! - **Per-command rules**: e.g. no acceleration under high stress
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        StreamOrchestrator                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐   │
//! │  │  Signal  │──▶│ Spectral  │──▶│ Classifier │──▶│  Safety   │   │
//! │  │  Source  │   │ (2s FFT)  │   │  (rules)   │   │   Gate    │   │
//! │  └──────────┘   └───────────┘   └────────────┘   └───────────┘   │
//! │       ▲                                                 │        │
//! │  commands                                               ▼        │
//! │  ┌──────────┐   ┌───────────┐                    ┌───────────┐   │
//! │  │ Band Log │◀──│ Telemetry │◀───────────────────│ Actuation │   │
//! │  │  (opt.)  │   │   Frame   │                    │  Planner  │   │
//! │  └──────────┘   └───────────┘                    └───────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use neurovex_core::{Config, SpectralProcessor, StateClassifier};
//!
//! let config = Config::default();
//! let mut processor = SpectralProcessor::from_config(&config).unwrap();
//! let classifier = StateClassifier::new();
//!
//! let chunk = vec![0.0; config.chunk_len()];
//! let bands = processor.process(&chunk).unwrap();
//! let classification = classifier.classify(&bands);
//! println!("{} ({:.2})", classification.state, classification.confidence);
//! ```

pub mod config;
pub mod core;
pub mod devices;
pub mod gateway;
pub mod orchestrator;
pub mod signal;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, DeviceMode};
pub use core::{
    ActuationPlanner, ActuatorIntent, BandPowers, Classification, CognitiveState, SafetyGate,
    SafetyVerdict, SpectralProcessor, StateClassifier, TelemetryFrame,
};
pub use devices::{DeviceHandle, DeviceProvider};
pub use orchestrator::{SessionState, SessionSummary, StreamError, StreamOrchestrator};
pub use signal::{ReplaySource, SampleChunk, SignalSource, SimulatedSource};
pub use transparency::{AuditLog, AuditStats, SharedAuditLog};

// Gateway re-exports
pub use gateway::{GatewayConfig, GatewayError};
#[cfg(feature = "gateway")]
pub use gateway::RestBandLogger;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown before any session drives hardware.
pub const SAFETY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 NEUROVEX CORE - SAFETY NOTICE                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This software is a research and demonstration tool.             ║
║  It is NOT a medical device and NOT for clinical use.            ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Estimates band powers from a single EEG channel             ║
║    • Labels a coarse cognitive state with fixed rules            ║
║    • Drives a light and a toy vehicle behind a safety gate       ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT DO:                                          ║
║    • No notch or bandpass filtering                              ║
║    • No diagnosis of any condition                               ║
║    • No decoding of intended movement (steering is a placeholder)║
║                                                                  ║
║  Actuation stops when signal quality drops, when fatigue is      ║
║  high, or when the emergency stop is latched.                    ║
║                                                                  ║
║  View pipeline statistics anytime with:                          ║
║    neurovex status                                               ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
