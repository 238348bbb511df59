//! Device handles given to sessions.
//!
//! A `DeviceHandle` bundles the safety gate and the actuator board one
//! session drives. The `DeviceProvider` decides whether sessions get their
//! own handle (isolated mode) or all receive the same one (shared mode), and
//! lets an operator reach every live gate at once.

use crate::config::{Config, DeviceMode};
use crate::core::actuation::ActuatorIntent;
use crate::core::safety::{SafetyGate, SafetyThresholds};
use crate::transparency::SharedAuditLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Label of the single handle issued in shared mode.
pub const SHARED_DEVICE_LABEL: &str = "shared";

/// What an actuator board was last told to do, and by whom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    pub intent: ActuatorIntent,
    /// Session that applied the intent
    pub last_writer: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Holds the last intent applied to a physical light and vehicle.
#[derive(Debug, Default)]
pub struct ActuatorBoard {
    state: RwLock<BoardState>,
}

impl ActuatorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an intent. In shared mode the last writer wins.
    pub fn apply(&self, intent: &ActuatorIntent, session: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.intent = *intent;
        state.last_writer = Some(session.to_string());
        state.updated_at = Some(Utc::now());
    }

    pub fn current(&self) -> BoardState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// The devices one session acts through.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    pub label: String,
    pub safety: Arc<SafetyGate>,
    pub board: Arc<ActuatorBoard>,
}

impl DeviceHandle {
    pub fn new(label: impl Into<String>, safety: SafetyGate) -> Self {
        Self {
            label: label.into(),
            safety: Arc::new(safety),
            board: Arc::new(ActuatorBoard::new()),
        }
    }

    /// Whether two handles drive the same physical device.
    pub fn same_device(&self, other: &DeviceHandle) -> bool {
        Arc::ptr_eq(&self.safety, &other.safety)
    }
}

/// Operator view of one live device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub label: String,
    pub emergency_stopped: bool,
    pub board: BoardState,
}

struct IssuedHandle {
    label: String,
    safety: Weak<SafetyGate>,
    board: Weak<ActuatorBoard>,
}

/// Hands out device handles according to the configured mode.
pub struct DeviceProvider {
    mode: DeviceMode,
    thresholds: SafetyThresholds,
    audit: Option<SharedAuditLog>,
    shared: Option<DeviceHandle>,
    issued: Mutex<Vec<IssuedHandle>>,
}

impl DeviceProvider {
    pub fn new(mode: DeviceMode, thresholds: SafetyThresholds, audit: Option<SharedAuditLog>) -> Self {
        let mut provider = Self {
            mode,
            thresholds,
            audit,
            shared: None,
            issued: Mutex::new(Vec::new()),
        };
        if mode == DeviceMode::Shared {
            let handle = provider.build_handle(SHARED_DEVICE_LABEL);
            provider.register(&handle);
            provider.shared = Some(handle);
        }
        provider
    }

    pub fn from_config(config: &Config, audit: Option<SharedAuditLog>) -> Self {
        Self::new(config.device_mode, SafetyThresholds::from_config(config), audit)
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Handle for a new session. Shared mode always returns the same device.
    pub fn for_session(&self, label: &str) -> DeviceHandle {
        if let Some(shared) = &self.shared {
            return shared.clone();
        }
        let handle = self.build_handle(label);
        self.register(&handle);
        tracing::debug!(label, "Issued isolated device handle");
        handle
    }

    /// Gates still held by at least one session (or the shared device).
    pub fn live_gates(&self) -> Vec<Arc<SafetyGate>> {
        self.live().into_iter().map(|(_, gate, _)| gate).collect()
    }

    /// Latch the emergency stop on every live gate. Returns how many were reached.
    pub fn emergency_stop_all(&self) -> usize {
        let gates = self.live_gates();
        for gate in &gates {
            gate.trigger_emergency_stop();
        }
        gates.len()
    }

    /// Clear the emergency stop on every live gate. Returns how many were reached.
    pub fn reset_all(&self) -> usize {
        let gates = self.live_gates();
        for gate in &gates {
            gate.reset_emergency_stop();
        }
        gates.len()
    }

    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.live()
            .into_iter()
            .map(|(label, gate, board)| DeviceSnapshot {
                label,
                emergency_stopped: gate.is_emergency_stopped(),
                board: board.current(),
            })
            .collect()
    }

    fn build_handle(&self, label: &str) -> DeviceHandle {
        let mut gate = SafetyGate::new(self.thresholds);
        if let Some(audit) = &self.audit {
            gate = gate.with_audit(audit.clone());
        }
        DeviceHandle::new(label, gate)
    }

    fn register(&self, handle: &DeviceHandle) {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.push(IssuedHandle {
            label: handle.label.clone(),
            safety: Arc::downgrade(&handle.safety),
            board: Arc::downgrade(&handle.board),
        });
    }

    fn live(&self) -> Vec<(String, Arc<SafetyGate>, Arc<ActuatorBoard>)> {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.retain(|h| h.safety.strong_count() > 0);
        issued
            .iter()
            .filter_map(|h| Some((h.label.clone(), h.safety.upgrade()?, h.board.upgrade()?)))
            .collect()
    }
}
