//! Maps a classification and safety verdict to actuator intents.

use crate::core::classifier::{Classification, CognitiveState};
use crate::core::safety::SafetyVerdict;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Focus value used whenever the state is not focus.
pub const FOCUS_FLOOR: u8 = 30;

/// Focus value above which the placeholder policy starts steering.
pub const STEERING_THRESHOLD: u8 = 60;

/// Bulb colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightColor {
    #[default]
    Warm,
    CoolWhite,
    WarmAmber,
    Red,
}

impl LightColor {
    /// Colour for a state; states without a mapping keep the default.
    pub fn for_state(state: CognitiveState) -> Self {
        match state {
            CognitiveState::Focus => LightColor::CoolWhite,
            CognitiveState::Relax => LightColor::WarmAmber,
            CognitiveState::Stress => LightColor::Red,
            _ => LightColor::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightIntent {
    /// 0-100
    pub brightness: u8,
    pub color: LightColor,
}

impl LightIntent {
    pub fn off() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.brightness > 0
    }
}

/// Vehicle heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Left,
    Right,
    Reverse,
    #[default]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleIntent {
    /// 0-100
    pub speed: u8,
    pub direction: Direction,
}

impl VehicleIntent {
    pub fn stop() -> Self {
        Self::default()
    }

    /// A vehicle with zero speed is stopped whatever its heading.
    pub fn is_stopped(&self) -> bool {
        self.speed == 0
    }
}

/// Target state for every actuator on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorIntent {
    pub light: LightIntent,
    pub vehicle: VehicleIntent,
}

impl ActuatorIntent {
    /// Light off, vehicle stopped.
    pub fn safe_idle() -> Self {
        Self::default()
    }
}

/// Chooses a vehicle heading.
///
/// Stand-in for motor-imagery decoding; swap implementations without
/// touching the planner.
pub trait DirectionStrategy: Send {
    fn choose(&mut self, focus_value: u8) -> Direction;
}

/// Picks forward, left or right at random once focus is above the steering
/// threshold; otherwise holds.
pub struct RandomDirection {
    rng: StdRng,
}

impl RandomDirection {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDirection {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectionStrategy for RandomDirection {
    fn choose(&mut self, focus_value: u8) -> Direction {
        if focus_value > STEERING_THRESHOLD {
            [Direction::Forward, Direction::Left, Direction::Right]
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(Direction::Stop)
        } else {
            Direction::Stop
        }
    }
}

/// Always returns the same heading.
#[derive(Debug, Clone, Copy)]
pub struct FixedDirection(pub Direction);

impl DirectionStrategy for FixedDirection {
    fn choose(&mut self, _focus_value: u8) -> Direction {
        self.0
    }
}

pub struct ActuationPlanner {
    strategy: Box<dyn DirectionStrategy>,
}

impl ActuationPlanner {
    pub fn new(strategy: Box<dyn DirectionStrategy>) -> Self {
        Self { strategy }
    }

    /// Replace the direction policy.
    pub fn set_strategy(&mut self, strategy: Box<dyn DirectionStrategy>) {
        self.strategy = strategy;
    }

    /// `confidence * 100` when focused, otherwise the fixed floor.
    pub fn focus_value(classification: &Classification) -> u8 {
        if classification.state == CognitiveState::Focus {
            (classification.confidence * 100.0).clamp(0.0, 100.0) as u8
        } else {
            FOCUS_FLOOR
        }
    }

    pub fn plan(&mut self, classification: &Classification, verdict: &SafetyVerdict) -> ActuatorIntent {
        if !verdict.signal_ok {
            return ActuatorIntent::safe_idle();
        }

        let focus_value = Self::focus_value(classification);
        let light = LightIntent {
            brightness: focus_value.min(100),
            color: LightColor::for_state(classification.state),
        };

        let vehicle = if focus_value < FOCUS_FLOOR || !verdict.vehicle_allowed() {
            VehicleIntent::stop()
        } else {
            VehicleIntent {
                speed: focus_value,
                direction: self.strategy.choose(focus_value),
            }
        };

        ActuatorIntent { light, vehicle }
    }
}

impl Default for ActuationPlanner {
    fn default() -> Self {
        Self::new(Box::new(RandomDirection::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(state: CognitiveState, confidence: f64) -> Classification {
        Classification {
            state,
            confidence,
            reason: String::new(),
        }
    }

    fn forward_planner() -> ActuationPlanner {
        ActuationPlanner::new(Box::new(FixedDirection(Direction::Forward)))
    }

    #[test]
    fn test_focus_sets_speed_from_confidence() {
        let mut planner = forward_planner();
        let intent = planner.plan(
            &classified(CognitiveState::Focus, 0.5),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.vehicle.speed, 50);
        assert_eq!(intent.vehicle.direction, Direction::Forward);
        assert!(!intent.vehicle.is_stopped());
        assert_eq!(intent.light.brightness, 50);
        assert_eq!(intent.light.color, LightColor::CoolWhite);
        assert!(intent.light.is_on());
    }

    #[test]
    fn test_bad_signal_stops_vehicle() {
        let mut planner = forward_planner();
        let verdict = SafetyVerdict {
            signal_ok: false,
            ..SafetyVerdict::clear()
        };
        for state in [CognitiveState::Focus, CognitiveState::Relax, CognitiveState::Stress] {
            let intent = planner.plan(&classified(state, 1.0), &verdict);
            assert_eq!(intent, ActuatorIntent::safe_idle());
            assert!(intent.vehicle.is_stopped());
            assert_eq!(intent.vehicle.direction, Direction::Stop);
            assert!(!intent.light.is_on());
        }
    }

    #[test]
    fn test_non_focus_uses_floor() {
        let mut planner = forward_planner();
        let intent = planner.plan(
            &classified(CognitiveState::Relax, 0.9),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.light.brightness, 30);
        assert_eq!(intent.light.color, LightColor::WarmAmber);
        assert_eq!(intent.vehicle.speed, 30);

        let intent = planner.plan(
            &classified(CognitiveState::Stress, 0.85),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.light.color, LightColor::Red);

        let intent = planner.plan(
            &classified(CognitiveState::Neutral, 0.5),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.light.color, LightColor::Warm);
    }

    #[test]
    fn test_low_focus_forces_stop() {
        let mut planner = forward_planner();
        let intent = planner.plan(
            &classified(CognitiveState::Focus, 0.29),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.vehicle, VehicleIntent::stop());
        assert_eq!(intent.light.brightness, 28);
    }

    #[test]
    fn test_fatigue_lock_stops_vehicle_but_keeps_light() {
        let mut planner = forward_planner();
        let verdict = SafetyVerdict {
            fatigue_locked: true,
            ..SafetyVerdict::clear()
        };
        let intent = planner.plan(&classified(CognitiveState::Focus, 0.9), &verdict);
        assert!(intent.vehicle.is_stopped());
        assert_eq!(intent.light.brightness, 90);

        let verdict = SafetyVerdict {
            motion_permitted: false,
            ..SafetyVerdict::clear()
        };
        let intent = planner.plan(&classified(CognitiveState::Focus, 0.9), &verdict);
        assert!(intent.vehicle.is_stopped());
    }

    #[test]
    fn test_random_direction_policy() {
        let mut strategy = RandomDirection::seeded(7);
        assert_eq!(strategy.choose(60), Direction::Stop);
        for _ in 0..50 {
            let direction = strategy.choose(61);
            assert!(matches!(
                direction,
                Direction::Forward | Direction::Left | Direction::Right
            ));
        }

        let mut a = RandomDirection::seeded(42);
        let mut b = RandomDirection::seeded(42);
        let first: Vec<Direction> = (0..10).map(|_| a.choose(90)).collect();
        let second: Vec<Direction> = (0..10).map(|_| b.choose(90)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_strategy_can_be_replaced() {
        let mut planner = ActuationPlanner::default();
        planner.set_strategy(Box::new(FixedDirection(Direction::Reverse)));
        let intent = planner.plan(
            &classified(CognitiveState::Focus, 1.0),
            &SafetyVerdict::clear(),
        );
        assert_eq!(intent.vehicle.direction, Direction::Reverse);
        assert_eq!(intent.vehicle.speed, 100);
    }

    #[test]
    fn test_intent_serialization() {
        let intent = ActuatorIntent {
            light: LightIntent {
                brightness: 80,
                color: LightColor::CoolWhite,
            },
            vehicle: VehicleIntent {
                speed: 80,
                direction: Direction::Left,
            },
        };
        let json = serde_json::to_value(intent).unwrap();
        assert_eq!(json["light"]["color"], "cool_white");
        assert_eq!(json["vehicle"]["direction"], "left");
    }
}
