//! Audit log of pipeline activity.
//!
//! This module counts what the pipeline did (ticks, frames, safety events,
//! band logs) without storing any signal data or session content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity counters for the running process.
#[derive(Debug)]
pub struct AuditLog {
    /// Number of ticks run through the pipeline
    ticks_processed: AtomicU64,
    /// Number of telemetry frames delivered
    frames_emitted: AtomicU64,
    /// Number of frames dropped by a full sink
    frames_dropped: AtomicU64,
    /// Number of ticks where the signal failed validation
    safety_lockouts: AtomicU64,
    /// Number of emergency stop triggers
    emergency_stops: AtomicU64,
    /// Number of emergency stop resets
    emergency_resets: AtomicU64,
    /// Number of band logs handed to a logging sink
    band_logs_queued: AtomicU64,
    /// Number of band logs a sink failed to store
    band_log_failures: AtomicU64,
    /// Number of malformed or unknown commands ignored
    commands_ignored: AtomicU64,
    /// Process start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            frames_emitted: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            safety_lockouts: AtomicU64::new(0),
            emergency_stops: AtomicU64::new(0),
            emergency_resets: AtomicU64::new(0),
            band_logs_queued: AtomicU64::new(0),
            band_log_failures: AtomicU64::new(0),
            commands_ignored: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that continues from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "Could not load previous audit stats");
        }

        log
    }

    pub fn record_tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_emitted(&self) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick whose actuator output was locked out.
    pub fn record_safety_lockout(&self) {
        self.safety_lockouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emergency_stop(&self) {
        self.emergency_stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emergency_reset(&self) {
        self.emergency_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_band_log_queued(&self) {
        self.band_logs_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_band_log_failure(&self) {
        self.band_log_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_ignored(&self) {
        self.commands_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            safety_lockouts: self.safety_lockouts.load(Ordering::Relaxed),
            emergency_stops: self.emergency_stops.load(Ordering::Relaxed),
            emergency_resets: self.emergency_resets.load(Ordering::Relaxed),
            band_logs_queued: self.band_logs_queued.load(Ordering::Relaxed),
            band_log_failures: self.band_log_failures.load(Ordering::Relaxed),
            commands_ignored: self.commands_ignored.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Pipeline Statistics:\n\
             - Ticks processed: {}\n\
             - Frames emitted: {}\n\
             - Frames dropped: {}\n\
             - Safety lockout ticks: {}\n\
             - Emergency stops: {} (resets: {})\n\
             - Band logs queued: {} (failures: {})\n\
             - Commands ignored: {}\n\
             - Uptime: {} seconds\n\
             \n\
             Data Handling:\n\
             - Raw samples are streamed, never stored by the pipeline\n\
             - Band logs are written only while a session is recording",
            stats.ticks_processed,
            stats.frames_emitted,
            stats.frames_dropped,
            stats.safety_lockouts,
            stats.emergency_stops,
            stats.emergency_resets,
            stats.band_logs_queued,
            stats.band_log_failures,
            stats.commands_ignored,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                ticks_processed: stats.ticks_processed,
                frames_emitted: stats.frames_emitted,
                frames_dropped: stats.frames_dropped,
                safety_lockouts: stats.safety_lockouts,
                emergency_stops: stats.emergency_stops,
                emergency_resets: stats.emergency_resets,
                band_logs_queued: stats.band_logs_queued,
                band_log_failures: stats.band_log_failures,
                commands_ignored: stats.commands_ignored,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.ticks_processed
                    .store(persisted.ticks_processed, Ordering::Relaxed);
                self.frames_emitted
                    .store(persisted.frames_emitted, Ordering::Relaxed);
                self.frames_dropped
                    .store(persisted.frames_dropped, Ordering::Relaxed);
                self.safety_lockouts
                    .store(persisted.safety_lockouts, Ordering::Relaxed);
                self.emergency_stops
                    .store(persisted.emergency_stops, Ordering::Relaxed);
                self.emergency_resets
                    .store(persisted.emergency_resets, Ordering::Relaxed);
                self.band_logs_queued
                    .store(persisted.band_logs_queued, Ordering::Relaxed);
                self.band_log_failures
                    .store(persisted.band_log_failures, Ordering::Relaxed);
                self.commands_ignored
                    .store(persisted.commands_ignored, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.ticks_processed,
            &self.frames_emitted,
            &self.frames_dropped,
            &self.safety_lockouts,
            &self.emergency_stops,
            &self.emergency_resets,
            &self.band_logs_queued,
            &self.band_log_failures,
            &self.commands_ignored,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub ticks_processed: u64,
    pub frames_emitted: u64,
    pub frames_dropped: u64,
    pub safety_lockouts: u64,
    pub emergency_stops: u64,
    pub emergency_resets: u64,
    pub band_logs_queued: u64,
    pub band_log_failures: u64,
    pub commands_ignored: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    ticks_processed: u64,
    #[serde(default)]
    frames_emitted: u64,
    #[serde(default)]
    frames_dropped: u64,
    #[serde(default)]
    safety_lockouts: u64,
    #[serde(default)]
    emergency_stops: u64,
    #[serde(default)]
    emergency_resets: u64,
    #[serde(default)]
    band_logs_queued: u64,
    #[serde(default)]
    band_log_failures: u64,
    #[serde(default)]
    commands_ignored: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

/// Create a new shared audit log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}
