//! Safety gate: signal validation, emergency-stop latch, fatigue lockout and
//! per-command actuation rules.
//!
//! Every check returns a plain boolean. Degraded conditions are verdicts, not
//! errors; the caller decides how to degrade output.

use crate::config::Config;
use crate::transparency::SharedAuditLog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Thresholds applied by the gate, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    /// Signal quality below this is rejected
    pub signal_quality: f64,
    /// Fatigue level above this locks out the vehicle
    pub fatigue_lockout: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            signal_quality: 80.0,
            fatigue_lockout: 80.0,
        }
    }
}

impl SafetyThresholds {
    pub fn from_config(config: &Config) -> Self {
        Self {
            signal_quality: config.signal_quality_threshold,
            fatigue_lockout: config.fatigue_lockout_threshold,
        }
    }
}

/// Per-tick summary of what the gate allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub signal_ok: bool,
    pub emergency_stopped: bool,
    pub fatigue_locked: bool,
    /// Whether the vehicle may accelerate in the current context
    pub motion_permitted: bool,
}

impl SafetyVerdict {
    /// A verdict that permits everything.
    pub fn clear() -> Self {
        Self {
            signal_ok: true,
            emergency_stopped: false,
            fatigue_locked: false,
            motion_permitted: true,
        }
    }

    /// Whether the vehicle may move at all this tick.
    pub fn vehicle_allowed(&self) -> bool {
        self.signal_ok && !self.fatigue_locked && self.motion_permitted
    }
}

/// Cognitive scores (0-100) a command rule can inspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuationContext {
    pub stress: f64,
    pub fatigue: f64,
    pub focus: f64,
}

/// A named check attached to one actuator command. Returns true to permit.
#[derive(Debug, Clone, Copy)]
pub struct CommandRule {
    pub name: &'static str,
    pub permits: fn(&ActuationContext) -> bool,
}

/// Command names understood by the default rule table.
pub const ACCELERATE: &str = "accelerate";

/// Stress above this forbids acceleration.
pub const MAX_STRESS_FOR_ACCELERATION: f64 = 70.0;

pub const STRESS_LIMITS_ACCELERATION: CommandRule = CommandRule {
    name: "stress_limits_acceleration",
    permits: |ctx| ctx.stress <= MAX_STRESS_FOR_ACCELERATION,
};

/// Stateful gate. The emergency-stop latch is atomic so one gate can be
/// handed to several sessions in shared-device mode.
#[derive(Debug)]
pub struct SafetyGate {
    thresholds: SafetyThresholds,
    emergency_stopped: AtomicBool,
    rules: HashMap<String, Vec<CommandRule>>,
    audit: Option<SharedAuditLog>,
}

impl SafetyGate {
    /// Create a gate with the default command rules.
    pub fn new(thresholds: SafetyThresholds) -> Self {
        Self::without_rules(thresholds).with_rule(ACCELERATE, STRESS_LIMITS_ACCELERATION)
    }

    /// Create a gate without any command rules.
    pub fn without_rules(thresholds: SafetyThresholds) -> Self {
        Self {
            thresholds,
            emergency_stopped: AtomicBool::new(false),
            rules: HashMap::new(),
            audit: None,
        }
    }

    /// Report latch changes to an audit log.
    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Add a rule for a command. Existing rules for the command are kept.
    pub fn with_rule(mut self, command: &str, rule: CommandRule) -> Self {
        self.rules.entry(command.to_string()).or_default().push(rule);
        self
    }

    pub fn thresholds(&self) -> SafetyThresholds {
        self.thresholds
    }

    pub fn rules_for(&self, command: &str) -> &[CommandRule] {
        self.rules.get(command).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped.load(Ordering::SeqCst)
    }

    /// Whether actuator output can be trusted this tick.
    pub fn validate_signal(&self, quality: f64) -> bool {
        if self.is_emergency_stopped() {
            return false;
        }
        quality >= self.thresholds.signal_quality
    }

    /// True when the fatigue level locks out the vehicle.
    pub fn check_fatigue_lockout(&self, fatigue_level: f64) -> bool {
        fatigue_level > self.thresholds.fatigue_lockout
    }

    pub fn trigger_emergency_stop(&self) {
        let was_stopped = self.emergency_stopped.swap(true, Ordering::SeqCst);
        tracing::warn!(
            target: "neurovex::audit",
            already_latched = was_stopped,
            "EMERGENCY STOP TRIGGERED"
        );
        if let Some(audit) = &self.audit {
            audit.record_emergency_stop();
        }
    }

    pub fn reset_emergency_stop(&self) {
        let was_stopped = self.emergency_stopped.swap(false, Ordering::SeqCst);
        tracing::warn!(
            target: "neurovex::audit",
            was_latched = was_stopped,
            "Emergency stop reset"
        );
        if let Some(audit) = &self.audit {
            audit.record_emergency_reset();
        }
    }

    /// Check a specific actuator command against the latch and its rules.
    pub fn is_safe_to_actuate(&self, command: &str, context: &ActuationContext) -> bool {
        if self.is_emergency_stopped() {
            return false;
        }
        match self.rules.get(command) {
            Some(rules) => match rules.iter().find(|rule| !(rule.permits)(context)) {
                Some(rule) => {
                    tracing::debug!(command, rule = rule.name, "Actuation refused");
                    false
                }
                None => true,
            },
            None => true,
        }
    }

    /// Evaluate every check for one tick.
    pub fn verdict(&self, quality: f64, context: &ActuationContext) -> SafetyVerdict {
        SafetyVerdict {
            signal_ok: self.validate_signal(quality),
            emergency_stopped: self.is_emergency_stopped(),
            fatigue_locked: self.check_fatigue_lockout(context.fatigue),
            motion_permitted: self.is_safe_to_actuate(ACCELERATE, context),
        }
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(SafetyThresholds::default())
    }
}
