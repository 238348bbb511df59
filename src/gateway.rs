//! REST gateway for band logs.
//!
//! Posts recorded band powers to a PostgREST-style `eeg_band_logs` table.
//! Writes are spawned on the tokio runtime; a slow or failing gateway never
//! delays a tick.

use crate::core::spectral::BandPowers;
use serde::{Deserialize, Serialize};

/// Table band logs are inserted into.
pub const BAND_LOG_TABLE: &str = "eeg_band_logs";

/// Environment variable holding the gateway base URL.
pub const GATEWAY_URL_ENV: &str = "NEUROVEX_GATEWAY_URL";

/// Environment variable holding the gateway API key.
pub const GATEWAY_KEY_ENV: &str = "NEUROVEX_GATEWAY_KEY";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://project.example.co`
    pub url: String,
    /// API key sent as `apikey` and as the bearer token
    pub api_key: String,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Read `NEUROVEX_GATEWAY_URL` and `NEUROVEX_GATEWAY_KEY`.
    pub fn from_env() -> Result<Self, GatewayError> {
        let url = std::env::var(GATEWAY_URL_ENV)
            .map_err(|_| GatewayError::Config(format!("{GATEWAY_URL_ENV} is not set")))?;
        let api_key = std::env::var(GATEWAY_KEY_ENV)
            .map_err(|_| GatewayError::Config(format!("{GATEWAY_KEY_ENV} is not set")))?;
        if url.trim().is_empty() {
            return Err(GatewayError::Config(format!("{GATEWAY_URL_ENV} is empty")));
        }
        Ok(Self::new(url.trim(), api_key.trim()))
    }

    /// Insert endpoint for band logs.
    pub fn band_log_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, BAND_LOG_TABLE)
    }
}

/// Gateway error types.
#[derive(Debug)]
pub enum GatewayError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "Gateway config error: {msg}"),
            GatewayError::Network(msg) => write!(f, "Gateway network error: {msg}"),
            GatewayError::Server { status, message } => {
                write!(f, "Gateway server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

/// Row inserted into the band log table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandLogRow {
    pub session_id: String,
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub signal_quality: f64,
}

impl BandLogRow {
    pub fn new(session_id: &str, bands: &BandPowers, quality: f64) -> Self {
        Self {
            session_id: session_id.to_string(),
            delta: bands.delta,
            theta: bands.theta,
            alpha: bands.alpha,
            beta: bands.beta,
            gamma: bands.gamma,
            signal_quality: quality,
        }
    }
}

#[cfg(feature = "gateway")]
pub use client::RestBandLogger;

#[cfg(feature = "gateway")]
mod client {
    use super::{BandLogRow, GatewayConfig, GatewayError};
    use crate::core::spectral::BandPowers;
    use crate::transparency::{BandLogger, SharedAuditLog};
    use std::sync::Arc;
    use std::time::Duration;

    /// Fire-and-forget band logger backed by the REST gateway.
    pub struct RestBandLogger {
        inner: Arc<Inner>,
        runtime: tokio::runtime::Handle,
    }

    struct Inner {
        config: GatewayConfig,
        client: reqwest::Client,
        audit: Option<SharedAuditLog>,
    }

    impl RestBandLogger {
        /// Create a logger bound to the current tokio runtime.
        pub fn new(config: GatewayConfig, audit: Option<SharedAuditLog>) -> Result<Self, GatewayError> {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| GatewayError::Config(format!("No tokio runtime: {e}")))?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

            Ok(Self {
                inner: Arc::new(Inner {
                    config,
                    client,
                    audit,
                }),
                runtime,
            })
        }

        pub fn config(&self) -> &GatewayConfig {
            &self.inner.config
        }

        /// Insert one row and wait for the result.
        pub async fn insert(&self, row: &BandLogRow) -> Result<(), GatewayError> {
            self.inner.insert(row).await
        }
    }

    impl Inner {
        async fn insert(&self, row: &BandLogRow) -> Result<(), GatewayError> {
            let response = self
                .client
                .post(self.config.band_log_url())
                .header("apikey", &self.config.api_key)
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .header("Prefer", "return=minimal")
                .json(row)
                .send()
                .await
                .map_err(|e| GatewayError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(GatewayError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            Ok(())
        }
    }

    impl BandLogger for RestBandLogger {
        fn log_bands(&self, session_id: &str, bands: &BandPowers, quality: f64) {
            let row = BandLogRow::new(session_id, bands, quality);
            let inner = self.inner.clone();
            if let Some(audit) = &inner.audit {
                audit.record_band_log_queued();
            }
            self.runtime.spawn(async move {
                if let Err(e) = inner.insert(&row).await {
                    tracing::warn!(session_id = %row.session_id, error = %e, "Band log upload failed");
                    if let Some(audit) = &inner.audit {
                        audit.record_band_log_failure();
                    }
                }
            });
        }
    }
}
