//! Band-power logging sinks.
//!
//! Logging is fire-and-forget: `log_bands` never blocks a tick and never
//! returns an error. Failures are logged and counted in the audit log.

use crate::core::spectral::BandPowers;
use crate::transparency::log::SharedAuditLog;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Capacity of the queue between the pipeline and a writer thread.
pub const BAND_LOG_QUEUE_CAPACITY: usize = 1024;

/// Receives band powers for recording sessions.
pub trait BandLogger: Send + Sync {
    fn log_bands(&self, session_id: &str, bands: &BandPowers, quality: f64);
}

/// One stored band-power row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandLogRecord {
    pub session_id: String,
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub signal_quality: f64,
    pub recorded_at: DateTime<Utc>,
}

impl BandLogRecord {
    pub fn new(session_id: &str, bands: &BandPowers, quality: f64) -> Self {
        Self {
            session_id: session_id.to_string(),
            delta: bands.delta,
            theta: bands.theta,
            alpha: bands.alpha,
            beta: bands.beta,
            gamma: bands.gamma,
            signal_quality: quality,
            recorded_at: Utc::now(),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBandLogger;

impl BandLogger for NullBandLogger {
    fn log_bands(&self, _session_id: &str, _bands: &BandPowers, _quality: f64) {}
}

/// Appends records as JSON lines from a background writer thread.
pub struct JsonlBandLogger {
    path: PathBuf,
    sender: Option<Sender<BandLogRecord>>,
    worker: Option<JoinHandle<()>>,
    audit: Option<SharedAuditLog>,
}

impl JsonlBandLogger {
    /// Open (or create) the log file and start the writer thread.
    pub fn open(path: impl AsRef<Path>, audit: Option<SharedAuditLog>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        // Bounded so a stalled disk cannot grow memory without limit
        let (sender, receiver) = bounded::<BandLogRecord>(BAND_LOG_QUEUE_CAPACITY);
        let worker_audit = audit.clone();
        let worker_path = path.clone();

        let worker = thread::Builder::new()
            .name("neurovex-bandlog".to_string())
            .spawn(move || {
                let mut writer = BufWriter::new(file);
                for record in receiver {
                    if let Err(e) = write_record(&mut writer, &record) {
                        tracing::warn!(
                            path = %worker_path.display(),
                            error = %e,
                            "Failed to write band log"
                        );
                        if let Some(audit) = &worker_audit {
                            audit.record_band_log_failure();
                        }
                    }
                }
            })?;

        tracing::info!(path = %path.display(), "Band logging to file");

        Ok(Self {
            path,
            sender: Some(sender),
            worker: Some(worker),
            audit,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_failure(&self) {
        if let Some(audit) = &self.audit {
            audit.record_band_log_failure();
        }
    }
}

fn write_record(writer: &mut BufWriter<File>, record: &BandLogRecord) -> std::io::Result<()> {
    let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
    writeln!(writer, "{line}")?;
    writer.flush()
}

impl BandLogger for JsonlBandLogger {
    fn log_bands(&self, session_id: &str, bands: &BandPowers, quality: f64) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(BandLogRecord::new(session_id, bands, quality)) {
            Ok(()) => {
                if let Some(audit) = &self.audit {
                    audit.record_band_log_queued();
                }
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id, "Band log queue full, record dropped");
                self.record_failure();
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(session_id, "Band log writer stopped, record dropped");
                self.record_failure();
            }
        }
    }
}

impl Drop for JsonlBandLogger {
    fn drop(&mut self) {
        // Closing the queue lets the writer drain and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
