//! Rule-based cognitive-state classification from band powers.
//!
//! Rules are evaluated in priority order and the first match wins, so the
//! states are mutually exclusive by precedence rather than by disjoint
//! conditions.

use crate::core::spectral::BandPowers;
use serde::{Deserialize, Serialize};

/// Cognitive state label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveState {
    Focus,
    Relax,
    Fatigue,
    Stress,
    Neutral,
    Unknown,
}

impl CognitiveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveState::Focus => "focus",
            CognitiveState::Relax => "relax",
            CognitiveState::Fatigue => "fatigue",
            CognitiveState::Stress => "stress",
            CognitiveState::Neutral => "neutral",
            CognitiveState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CognitiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CognitiveState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "focus" => Ok(CognitiveState::Focus),
            "relax" => Ok(CognitiveState::Relax),
            "fatigue" => Ok(CognitiveState::Fatigue),
            "stress" => Ok(CognitiveState::Stress),
            "neutral" => Ok(CognitiveState::Neutral),
            "unknown" => Ok(CognitiveState::Unknown),
            other => Err(format!("unknown cognitive state '{other}'")),
        }
    }
}

/// Result of classifying one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub state: CognitiveState,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Human-readable explanation naming the dominant share
    pub reason: String,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            state: CognitiveState::Unknown,
            confidence: 0.0,
            reason: "No signal detected.".to_string(),
        }
    }

    /// Confidence as a 0-100 score when the classification is `state`, else 0.
    pub fn level_of(&self, state: CognitiveState) -> f64 {
        if self.state == state {
            self.confidence * 100.0
        } else {
            0.0
        }
    }
}

/// Band powers as a fraction of total power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl RelativePowers {
    /// Returns `None` when total power is zero.
    pub fn from_bands(bands: &BandPowers) -> Option<Self> {
        let total = bands.total();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(Self {
            delta: bands.delta / total,
            theta: bands.theta / total,
            alpha: bands.alpha / total,
            beta: bands.beta / total,
            gamma: bands.gamma / total,
        })
    }
}

/// One entry of the ordered rule table.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub state: CognitiveState,
    pub matches: fn(&RelativePowers) -> bool,
    pub confidence: fn(&RelativePowers) -> f64,
    pub reason: fn(&RelativePowers) -> String,
}

impl ClassificationRule {
    /// Apply the rule, returning a classification when it matches.
    pub fn evaluate(&self, rel: &RelativePowers) -> Option<Classification> {
        if !(self.matches)(rel) {
            return None;
        }
        Some(Classification {
            state: self.state,
            confidence: (self.confidence)(rel).clamp(0.0, 1.0),
            reason: (self.reason)(rel),
        })
    }
}

impl std::fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

fn percent(share: f64) -> u32 {
    (share * 100.0) as u32
}

pub const FOCUS_RULE: ClassificationRule = ClassificationRule {
    name: "focus",
    state: CognitiveState::Focus,
    matches: |r| r.beta > 0.4 && r.beta > r.alpha,
    confidence: |r| (r.beta * 2.0).min(1.0),
    reason: |r| {
        format!(
            "High Beta ({}%) activity indicates active concentration.",
            percent(r.beta)
        )
    },
};

pub const RELAX_RULE: ClassificationRule = ClassificationRule {
    name: "relax",
    state: CognitiveState::Relax,
    matches: |r| r.alpha > 0.4,
    confidence: |r| (r.alpha * 2.0).min(1.0),
    reason: |r| {
        format!(
            "Dominant Alpha ({}%) waves indicate a calm, wakeful state.",
            percent(r.alpha)
        )
    },
};

pub const FATIGUE_RULE: ClassificationRule = ClassificationRule {
    name: "fatigue",
    state: CognitiveState::Fatigue,
    matches: |r| r.theta > 0.35,
    confidence: |r| (r.theta * 2.5).min(1.0),
    reason: |r| {
        format!(
            "Elevated Theta ({}%) suggests drowsiness or fatigue.",
            percent(r.theta)
        )
    },
};

pub const STRESS_RULE: ClassificationRule = ClassificationRule {
    name: "stress",
    state: CognitiveState::Stress,
    matches: |r| r.gamma > 0.3,
    confidence: |_| 0.85,
    reason: |r| {
        format!(
            "Abnormal Gamma ({}%) spikes detected, correlating with high stress.",
            percent(r.gamma)
        )
    },
};

pub const NEUTRAL_RULE: ClassificationRule = ClassificationRule {
    name: "neutral",
    state: CognitiveState::Neutral,
    matches: |_| true,
    confidence: |_| 0.5,
    reason: |_| "Balanced spectral power distribution.".to_string(),
};

/// The standard rule table, highest priority first.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![FOCUS_RULE, RELAX_RULE, FATIGUE_RULE, STRESS_RULE, NEUTRAL_RULE]
}

/// Stateless classifier over an ordered rule table.
#[derive(Debug, Clone)]
pub struct StateClassifier {
    rules: Vec<ClassificationRule>,
}

impl StateClassifier {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Insert a rule ahead of the existing ones at `priority` (0 = first).
    pub fn insert_rule(&mut self, priority: usize, rule: ClassificationRule) {
        let index = priority.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, bands: &BandPowers) -> Classification {
        let Some(rel) = RelativePowers::from_bands(bands) else {
            return Classification::unknown();
        };

        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(&rel))
            .unwrap_or_else(|| Classification {
                state: CognitiveState::Neutral,
                confidence: 0.5,
                reason: "No rule matched.".to_string(),
            })
    }
}

impl Default for StateClassifier {
    fn default() -> Self {
        Self::new()
    }
}
