//! Neurovex CLI
//!
//! Runs local simulated sessions, serves dashboard clients and reports
//! pipeline statistics.

use clap::{Parser, Subcommand};
use neurovex_core::{
    config::{Config, DeviceMode},
    core::{CognitiveState, TelemetryFrame},
    devices::DeviceProvider,
    orchestrator::StreamOrchestrator,
    signal::{ControlCommand, SimulatedSource},
    transparency::{
        create_shared_log_with_persistence, BandLogger, JsonlBandLogger, NullBandLogger,
    },
    SAFETY_NOTICE, VERSION,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neurovex")]
#[command(author = "Neurovex")]
#[command(version = VERSION)]
#[command(about = "Real-time EEG band analysis with safety-gated actuation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one local session against the built-in simulator
    Run {
        /// State the simulator should produce (focus, relax, fatigue, stress, neutral)
        #[arg(long)]
        state: Option<CognitiveState>,

        /// Stop after this many frames
        #[arg(long)]
        ticks: Option<u64>,

        /// Start recording band logs under this session id
        #[arg(long)]
        record: Option<String>,

        /// Use shared device mode
        #[arg(long)]
        shared: bool,

        /// Write band logs to the JSON-lines file in the data directory
        #[arg(long)]
        log_bands: bool,

        /// Signal quality the simulator reports
        #[arg(long)]
        quality: Option<f64>,

        /// Seed the simulator for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Serve dashboard clients over HTTP and WebSocket (requires server feature)
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long, short)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Write band logs to the JSON-lines file in the data directory
        #[arg(long)]
        log_bands: bool,

        /// Forward band logs to the REST gateway configured in the environment
        #[arg(long)]
        gateway: bool,

        /// Use shared device mode
        #[arg(long)]
        shared: bool,
    },

    /// Show cumulative pipeline statistics
    Status,

    /// Show configuration
    Config,

    /// Display the safety notice
    Notice,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            state,
            ticks,
            record,
            shared,
            log_bands,
            quality,
            seed,
        } => {
            let options = RunOptions {
                state,
                ticks,
                record,
                shared,
                log_bands,
                quality,
                seed,
            };
            cmd_run(options).await
        }
        Commands::Serve {
            port,
            host,
            log_bands,
            gateway,
            shared,
        } => cmd_serve(port, host, log_bands, gateway, shared).await,
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
        Commands::Notice => {
            println!("{SAFETY_NOTICE}");
            Ok(())
        }
    }
}

struct RunOptions {
    state: Option<CognitiveState>,
    ticks: Option<u64>,
    record: Option<String>,
    shared: bool,
    log_bands: bool,
    quality: Option<f64>,
    seed: Option<u64>,
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration, using defaults: {e}");
        Config::default()
    })
}

async fn cmd_run(options: RunOptions) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(state) = options.state {
        config.simulated_state = state;
    }
    if let Some(quality) = options.quality {
        config.simulated_quality = quality;
    }
    if options.shared {
        config.device_mode = DeviceMode::Shared;
    }
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Neurovex v{VERSION}");
    println!();
    println!("Starting simulated session...");
    println!("  Simulated state: {}", config.simulated_state);
    println!("  Signal quality: {:.1}", config.simulated_quality);
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  Tick: {} ms", config.tick_duration.as_millis());
    println!("  Device mode: {}", config.device_mode.as_str());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let audit = create_shared_log_with_persistence(config.audit_path());
    let devices = DeviceProvider::from_config(&config, Some(audit.clone()));

    let band_logger: Arc<dyn BandLogger> = if options.log_bands {
        let logger = JsonlBandLogger::open(config.band_log_path(), Some(audit.clone()))?;
        println!("Band logs: {}", logger.path().display());
        Arc::new(logger)
    } else {
        Arc::new(NullBandLogger)
    };

    let mut source = SimulatedSource::from_config(&config);
    if let Some(seed) = options.seed {
        source = source.with_seed(seed);
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel::<String>();
    let (frame_tx, mut frame_rx) = mpsc::channel::<TelemetryFrame>(64);

    if let Some(session_id) = options.record {
        let command = serde_json::to_string(&ControlCommand::start_log(session_id))?;
        let _ = command_tx.send(command);
    }

    let mut orchestrator = StreamOrchestrator::new(
        &config,
        source,
        command_rx,
        frame_tx,
        devices.for_session("cli"),
    )?
    .with_label("cli")
    .with_audit(audit.clone())
    .with_band_logger(band_logger);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let session = tokio::spawn(async move { orchestrator.run().await });

    let mut printed = 0u64;
    while let Some(frame) = frame_rx.recv().await {
        println!("{}", format_frame(&frame));
        printed += 1;
        if !running.load(Ordering::SeqCst) || options.ticks.is_some_and(|limit| printed >= limit) {
            break;
        }
    }

    drop(frame_rx);
    drop(command_tx);

    let summary = session.await??;
    println!();
    println!(
        "Session closed ({:?}): {} ticks, {} frames, {} dropped",
        summary.reason, summary.ticks, summary.frames_sent, summary.frames_dropped
    );

    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }
    println!();
    println!("{}", audit.summary());
    Ok(())
}

fn format_frame(frame: &TelemetryFrame) -> String {
    let mut flags = Vec::new();
    if frame.status.safety_lock {
        flags.push("SAFETY LOCK");
    }
    if frame.status.emergency_stop {
        flags.push("E-STOP");
    }
    if frame.status.fatigue_lock {
        flags.push("FATIGUE LOCK");
    }
    if frame.status.recording {
        flags.push("REC");
    }

    format!(
        "[{:>5}] {:<8} {:>4.2} | bulb {:>3}% {:?} | car {:>3} {:?} | {}",
        frame.sequence,
        frame.analysis.state.as_str(),
        frame.analysis.confidence,
        frame.hardware.bulb.brightness,
        frame.hardware.bulb.color,
        frame.hardware.car.speed,
        frame.hardware.car.direction,
        flags.join(" ")
    )
}

#[cfg(feature = "server")]
async fn cmd_serve(
    port: Option<u16>,
    host: IpAddr,
    log_bands: bool,
    gateway: bool,
    shared: bool,
) -> anyhow::Result<()> {
    use neurovex_core::server::{self, BandLogTarget, ServerConfig};
    use neurovex_core::GatewayConfig;

    let mut config = load_config();
    if shared {
        config.device_mode = DeviceMode::Shared;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let band_log = if gateway {
        BandLogTarget::Gateway(GatewayConfig::from_env()?)
    } else if log_bands {
        BandLogTarget::File
    } else {
        BandLogTarget::Disabled
    };

    let audit = create_shared_log_with_persistence(config.audit_path());
    let server_config = ServerConfig::new(port.unwrap_or(config.server_port), config)
        .with_host(host)
        .with_band_log(band_log);

    let (addr, shutdown_tx) = server::run(server_config, audit.clone()).await?;
    println!("Neurovex v{VERSION} serving on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());

    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(
    _port: Option<u16>,
    _host: IpAddr,
    _log_bands: bool,
    _gateway: bool,
    _shared: bool,
) -> anyhow::Result<()> {
    anyhow::bail!(
        "Server not enabled. Rebuild with --features server:\n\
         cargo run --features server -- serve"
    )
}

fn cmd_status() {
    let config = load_config();

    println!("Neurovex Status");
    println!("===============");
    println!();
    println!("Configuration:");
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  Window: {} s", config.buffer_window_seconds);
    println!("  Tick: {} ms", config.tick_duration.as_millis());
    println!("  Signal quality threshold: {:.1}", config.signal_quality_threshold);
    println!("  Fatigue lockout threshold: {:.1}", config.fatigue_lockout_threshold);
    println!("  Device mode: {}", config.device_mode.as_str());
    println!();

    let stats_path = config.audit_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("ticks_processed", "Ticks processed"),
                    ("frames_emitted", "Frames emitted"),
                    ("frames_dropped", "Frames dropped"),
                    ("safety_lockouts", "Safety lockout ticks"),
                    ("emergency_stops", "Emergency stops"),
                    ("emergency_resets", "Emergency resets"),
                    ("band_logs_queued", "Band logs queued"),
                    ("band_log_failures", "Band log failures"),
                    ("commands_ignored", "Commands ignored"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
                if let Some(updated) = stats.get("last_updated").and_then(|v| v.as_str()) {
                    println!("  Last updated: {updated}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
