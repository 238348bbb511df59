//! Telemetry frames emitted once per tick.
//!
//! Field names follow the dashboard wire format: `signal`, `bands`,
//! `analysis`, `hardware.bulb`, `hardware.car` and `status`. Extra fields
//! (`sequence`, `session_id`, `status.emergency_stop`, `status.fatigue_lock`)
//! are additive and ignored by older consumers.

use crate::core::actuation::{ActuatorIntent, Direction, LightColor};
use crate::core::classifier::Classification;
use crate::core::safety::SafetyVerdict;
use crate::core::spectral::BandPowers;
use crate::signal::SampleChunk;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BULB_DEVICE: &str = "smart_bulb";
pub const CAR_DEVICE: &str = "rc_car";

/// Number of EEG channels the pipeline consumes.
pub const CHANNEL_COUNT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulbStatus {
    pub device: String,
    pub state: PowerState,
    pub brightness: u8,
    pub color: LightColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarStatus {
    pub device: String,
    pub speed: u8,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareStatus {
    pub bulb: BulbStatus,
    pub car: CarStatus,
}

impl From<&ActuatorIntent> for HardwareStatus {
    fn from(intent: &ActuatorIntent) -> Self {
        Self {
            bulb: BulbStatus {
                device: BULB_DEVICE.to_string(),
                state: if intent.light.is_on() {
                    PowerState::On
                } else {
                    PowerState::Off
                },
                brightness: intent.light.brightness,
                color: intent.light.color,
            },
            car: CarStatus {
                device: CAR_DEVICE.to_string(),
                speed: intent.vehicle.speed,
                direction: intent.vehicle.direction,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub connected: bool,
    pub recording: bool,
    /// True when actuator output is not trusted (`!signal_ok`)
    pub safety_lock: bool,
    pub channel_count: u32,
    pub emergency_stop: bool,
    pub fatigue_lock: bool,
}

/// One tick of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Unix time in seconds
    pub timestamp: f64,
    /// Tick counter within the session
    pub sequence: u64,
    /// Recording id while recording
    pub session_id: Option<String>,
    /// Raw samples of this tick's chunk
    pub signal: Vec<f64>,
    pub bands: BandPowers,
    pub analysis: Classification,
    pub hardware: HardwareStatus,
    pub status: StreamStatus,
}

/// Stamps frames with a timestamp and per-session sequence number.
pub struct TelemetryBuilder {
    instance_id: Uuid,
    sequence: u64,
}

impl TelemetryBuilder {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            sequence: 0,
        }
    }

    /// Identifier of the session this builder stamps.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Frames built so far.
    pub fn frames_built(&self) -> u64 {
        self.sequence
    }

    pub fn build(
        &mut self,
        chunk: &SampleChunk,
        bands: BandPowers,
        analysis: Classification,
        intent: &ActuatorIntent,
        verdict: &SafetyVerdict,
        recording: Option<&str>,
    ) -> TelemetryFrame {
        let sequence = self.sequence;
        self.sequence += 1;

        TelemetryFrame {
            timestamp: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
            sequence,
            session_id: recording.map(str::to_string),
            signal: chunk.samples.clone(),
            bands,
            analysis,
            hardware: HardwareStatus::from(intent),
            status: StreamStatus {
                connected: true,
                recording: recording.is_some(),
                safety_lock: !verdict.signal_ok,
                channel_count: CHANNEL_COUNT,
                emergency_stop: verdict.emergency_stopped,
                fatigue_lock: verdict.fatigue_locked,
            },
        }
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actuation::{LightIntent, VehicleIntent};
    use crate::core::classifier::CognitiveState;

    fn sample_frame(builder: &mut TelemetryBuilder, recording: Option<&str>) -> TelemetryFrame {
        let chunk = SampleChunk::new(vec![1.0, -1.0, 0.5], 95.0);
        let intent = ActuatorIntent {
            light: LightIntent {
                brightness: 70,
                color: LightColor::CoolWhite,
            },
            vehicle: VehicleIntent {
                speed: 70,
                direction: Direction::Forward,
            },
        };
        let analysis = Classification {
            state: CognitiveState::Focus,
            confidence: 0.7,
            reason: "test".to_string(),
        };
        builder.build(
            &chunk,
            BandPowers::default(),
            analysis,
            &intent,
            &SafetyVerdict::clear(),
            recording,
        )
    }

    #[test]
    fn test_frame_wire_format() {
        let mut builder = TelemetryBuilder::new();
        let frame = sample_frame(&mut builder, Some("sess-1"));
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["signal"].as_array().unwrap().len(), 3);
        assert_eq!(json["analysis"]["state"], "focus");
        assert_eq!(json["hardware"]["bulb"]["device"], "smart_bulb");
        assert_eq!(json["hardware"]["bulb"]["state"], "on");
        assert_eq!(json["hardware"]["bulb"]["color"], "cool_white");
        assert_eq!(json["hardware"]["car"]["device"], "rc_car");
        assert_eq!(json["hardware"]["car"]["direction"], "forward");
        assert_eq!(json["status"]["connected"], true);
        assert_eq!(json["status"]["recording"], true);
        assert_eq!(json["status"]["safety_lock"], false);
        assert_eq!(json["status"]["channel_count"], 1);
        assert_eq!(json["session_id"], "sess-1");
        assert!(json["timestamp"].as_f64().unwrap() > 1_600_000_000.0);
    }

    #[test]
    fn test_sequence_increments() {
        let mut builder = TelemetryBuilder::new();
        assert_eq!(sample_frame(&mut builder, None).sequence, 0);
        let second = sample_frame(&mut builder, None);
        assert_eq!(second.sequence, 1);
        assert!(!second.status.recording);
        assert_eq!(second.session_id, None);
        assert_eq!(builder.frames_built(), 2);
    }

    #[test]
    fn test_bulb_off_when_dark() {
        let status = HardwareStatus::from(&ActuatorIntent::safe_idle());
        assert_eq!(status.bulb.state, PowerState::Off);
        assert_eq!(status.car.direction, Direction::Stop);
    }
}
