//! Transparency module for Neurovex.
//!
//! This module provides the audit counters that show what the pipeline
//! did, and the sinks that record band powers for recording sessions.

pub mod bandlog;
pub mod log;

// Re-export commonly used types
pub use bandlog::{BandLogRecord, BandLogger, JsonlBandLogger, NullBandLogger};
pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
