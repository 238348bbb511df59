//! HTTP and WebSocket server for dashboard clients.
//!
//! This module provides a server that:
//! - Runs one streaming session per WebSocket connection on `/ws/stream`
//! - Accepts `start_log` / `stop_log` commands over the same socket
//! - Exposes operator safety controls and device state under `/api/v1`
//!
//! # Architecture
//!
//! ```text
//! Dashboard ──ws──→ /ws/stream ──→ StreamOrchestrator ──→ frames ──ws──→ Dashboard
//!                                       │
//!                                 DeviceProvider ←── /api/v1/safety/*
//! ```

use crate::config::Config;
use crate::core::safety::SafetyThresholds;
use crate::core::telemetry::TelemetryFrame;
use crate::devices::{DeviceProvider, DeviceSnapshot};
use crate::gateway::{GatewayConfig, RestBandLogger};
use crate::orchestrator::StreamOrchestrator;
use crate::signal::SimulatedSource;
use crate::transparency::{
    AuditStats, BandLogger, JsonlBandLogger, NullBandLogger, SharedAuditLog,
};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

/// Commands buffered per connection before new ones are dropped.
const COMMAND_QUEUE: usize = 32;

/// Frames buffered per connection before new ones are dropped.
const FRAME_QUEUE: usize = 16;

/// Where recorded band powers go.
#[derive(Debug, Clone, Default)]
pub enum BandLogTarget {
    #[default]
    Disabled,
    /// JSON lines under the configured data directory
    File,
    /// REST gateway
    Gateway(GatewayConfig),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Pipeline settings for every session
    pub pipeline: Config,
    pub band_log: BandLogTarget,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, pipeline: Config) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            pipeline,
            band_log: BandLogTarget::Disabled,
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_band_log(mut self, target: BandLogTarget) -> Self {
        self.band_log = target;
        self
    }
}

/// Shared server state
pub struct ServerState {
    pipeline: Config,
    devices: DeviceProvider,
    audit: SharedAuditLog,
    band_logger: Arc<dyn BandLogger>,
}

impl ServerState {
    pub fn new(config: &ServerConfig, audit: SharedAuditLog) -> anyhow::Result<Self> {
        config.pipeline.validate()?;

        let band_logger: Arc<dyn BandLogger> = match &config.band_log {
            BandLogTarget::Disabled => Arc::new(NullBandLogger),
            BandLogTarget::File => Arc::new(JsonlBandLogger::open(
                config.pipeline.band_log_path(),
                Some(audit.clone()),
            )?),
            BandLogTarget::Gateway(gateway) => {
                Arc::new(RestBandLogger::new(gateway.clone(), Some(audit.clone()))?)
            }
        };

        Ok(Self {
            devices: DeviceProvider::from_config(&config.pipeline, Some(audit.clone())),
            pipeline: config.pipeline.clone(),
            audit,
            band_logger,
        })
    }
}

/// Root response
#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub system_status: String,
    pub stream: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub device_mode: String,
    pub live_devices: usize,
}

/// Safety overview
#[derive(Serialize)]
pub struct SafetyResponse {
    pub device_mode: String,
    pub thresholds: SafetyThresholds,
    pub live_devices: usize,
    pub emergency_stopped: usize,
    pub stats: AuditStats,
}

/// Result of an operator safety action
#[derive(Serialize)]
pub struct SafetyActionResponse {
    pub status: String,
    pub devices_reached: usize,
}

/// GET /
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Neurovex streaming core is online".to_string(),
        system_status: "nominal".to_string(),
        stream: "/ws/stream".to_string(),
    })
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device_mode: state.devices.mode().as_str().to_string(),
        live_devices: state.devices.live_gates().len(),
    })
}

/// GET /api/v1/safety
async fn safety_status(State(state): State<Arc<ServerState>>) -> Json<SafetyResponse> {
    let gates = state.devices.live_gates();
    Json(SafetyResponse {
        device_mode: state.devices.mode().as_str().to_string(),
        thresholds: SafetyThresholds::from_config(&state.pipeline),
        live_devices: gates.len(),
        emergency_stopped: gates.iter().filter(|g| g.is_emergency_stopped()).count(),
        stats: state.audit.stats(),
    })
}

/// POST /api/v1/safety/emergency-stop
async fn emergency_stop(State(state): State<Arc<ServerState>>) -> Json<SafetyActionResponse> {
    let devices_reached = state.devices.emergency_stop_all();
    tracing::warn!(target: "neurovex::audit", devices_reached, "Operator emergency stop");
    Json(SafetyActionResponse {
        status: "stopped".to_string(),
        devices_reached,
    })
}

/// POST /api/v1/safety/reset
async fn reset_emergency_stop(State(state): State<Arc<ServerState>>) -> Json<SafetyActionResponse> {
    let devices_reached = state.devices.reset_all();
    tracing::warn!(target: "neurovex::audit", devices_reached, "Operator emergency reset");
    Json(SafetyActionResponse {
        status: "reset".to_string(),
        devices_reached,
    })
}

/// GET /api/v1/devices
async fn devices(State(state): State<Arc<ServerState>>) -> Json<Vec<DeviceSnapshot>> {
    Json(state.devices.snapshot())
}

/// GET /ws/stream
async fn ws_stream(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one session for the lifetime of a WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let label = uuid::Uuid::new_v4().to_string();
    let (command_tx, command_rx) = mpsc::channel::<String>(COMMAND_QUEUE);
    let (frame_tx, mut frame_rx) = mpsc::channel::<TelemetryFrame>(FRAME_QUEUE);

    let orchestrator = StreamOrchestrator::new(
        &state.pipeline,
        SimulatedSource::from_config(&state.pipeline),
        command_rx,
        frame_tx,
        state.devices.for_session(&label),
    );
    let mut orchestrator = match orchestrator {
        Ok(o) => o
            .with_label(label.clone())
            .with_audit(state.audit.clone())
            .with_band_logger(state.band_logger.clone()),
        Err(e) => {
            tracing::error!(error = %e, "Could not start session");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    tracing::info!(session = %label, "WebSocket client connected");
    let session = tokio::spawn(async move { orchestrator.run().await });

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(session = %label, error = %e, "Failed to encode frame"),
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if command_tx.try_send(text.to_string()).is_err() {
                            tracing::warn!(session = %label, "Command queue full, command dropped");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    // Closing both channels ends the orchestrator at its next poll
    drop(command_tx);
    drop(frame_rx);
    match session.await {
        Ok(Ok(summary)) => {
            tracing::info!(session = %label, ticks = summary.ticks, "WebSocket client disconnected")
        }
        Ok(Err(e)) => tracing::error!(session = %label, error = %e, "Session failed"),
        Err(e) => tracing::error!(session = %label, error = %e, "Session task panicked"),
    }
}

/// Build the router over a prepared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ws/stream", get(ws_stream))
        .route("/api/v1/safety", get(safety_status))
        .route("/api/v1/safety/emergency-stop", post(emergency_stop))
        .route("/api/v1/safety/reset", post(reset_emergency_stop))
        .route("/api/v1/devices", get(devices))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server
pub async fn run(
    config: ServerConfig,
    audit: SharedAuditLog,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config, audit)?);
    let app = router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Neurovex server listening on http://{}", actual_addr);
    tracing::info!("Stream endpoint: ws://{}/ws/stream", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
