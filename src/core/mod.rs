//! Processing stages of the Neurovex pipeline.
//!
//! This module contains:
//! - Rolling-window spectral analysis into band powers
//! - Rule-based cognitive-state classification
//! - The safety gate and its per-command rules
//! - Actuation planning for the light and vehicle
//! - Telemetry frame building

pub mod actuation;
pub mod classifier;
pub mod safety;
pub mod spectral;
pub mod telemetry;

// Re-export commonly used types
pub use actuation::{
    ActuationPlanner, ActuatorIntent, Direction, DirectionStrategy, FixedDirection, LightColor,
    LightIntent, RandomDirection, VehicleIntent,
};
pub use classifier::{
    default_rules, Classification, ClassificationRule, CognitiveState, RelativePowers,
    StateClassifier,
};
pub use safety::{ActuationContext, CommandRule, SafetyGate, SafetyThresholds, SafetyVerdict};
pub use spectral::{
    Band, BandEdge, BandPowers, RollingBuffer, SpectralError, SpectralProcessor,
    DEFAULT_BAND_EDGES,
};
pub use telemetry::{StreamStatus, TelemetryBuilder, TelemetryFrame};
