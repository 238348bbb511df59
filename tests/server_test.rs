//! Integration tests for the Neurovex HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use futures_util::{SinkExt, StreamExt};
    use neurovex_core::config::{Config, DeviceMode};
    use neurovex_core::server::{run, ServerConfig};
    use neurovex_core::transparency::create_shared_log;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    async fn start(mode: DeviceMode) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let pipeline = Config {
            device_mode: mode,
            ..Config::default()
        };
        let (addr, shutdown_tx) = run(ServerConfig::new(0, pipeline), create_shared_log())
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start(DeviceMode::Isolated).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["device_mode"], "isolated");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (addr, shutdown_tx) = start(DeviceMode::Isolated).await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/", addr))
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["system_status"], "nominal");
        assert_eq!(body["stream"], "/ws/stream");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_emergency_stop_and_reset() {
        let (addr, shutdown_tx) = start(DeviceMode::Shared).await;
        let client = reqwest::Client::new();

        let stop: serde_json::Value = client
            .post(format!("http://{}/api/v1/safety/emergency-stop", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(stop["status"], "stopped");
        assert_eq!(stop["devices_reached"], 1);

        let safety: serde_json::Value = client
            .get(format!("http://{}/api/v1/safety", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(safety["device_mode"], "shared");
        assert_eq!(safety["emergency_stopped"], 1);
        assert_eq!(safety["thresholds"]["signal_quality"], 80.0);
        assert_eq!(safety["stats"]["emergency_stops"], 1);

        let reset: serde_json::Value = client
            .post(format!("http://{}/api/v1/safety/reset", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(reset["status"], "reset");

        let devices: serde_json::Value = client
            .get(format!("http://{}/api/v1/devices", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let devices = devices.as_array().expect("Expected an array");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["label"], "shared");
        assert_eq!(devices[0]["emergency_stopped"], false);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_isolated_mode_without_sessions_has_no_devices() {
        let (addr, shutdown_tx) = start(DeviceMode::Isolated).await;

        let stop: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{}/api/v1/safety/emergency-stop", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(stop["devices_reached"], 0);

        let _ = shutdown_tx.send(());
    }

    async fn device_count(client: &reqwest::Client, addr: std::net::SocketAddr) -> usize {
        let devices: serde_json::Value = client
            .get(format!("http://{}/api/v1/devices", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        devices.as_array().expect("Expected an array").len()
    }

    #[tokio::test]
    async fn test_stream_records_and_closes_on_disconnect() {
        let (addr, shutdown_tx) = start(DeviceMode::Isolated).await;
        let client = reqwest::Client::new();

        let (mut ws, _) = connect_async(format!("ws://{}/ws/stream", addr))
            .await
            .expect("Failed to connect");
        ws.send(Message::Text(
            r#"{"action": "start_log", "session_id": "ws-1"}"#.to_string(),
        ))
        .await
        .expect("Failed to send command");

        let recording_frame = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(message) = ws.next().await {
                let Ok(Message::Text(text)) = message else {
                    continue;
                };
                let frame: serde_json::Value =
                    serde_json::from_str(&text).expect("Failed to parse frame");
                if frame["status"]["recording"] == true {
                    return Some(frame);
                }
            }
            None
        })
        .await
        .expect("No recording frame in time")
        .expect("Stream ended early");

        assert_eq!(recording_frame["session_id"], "ws-1");
        assert_eq!(recording_frame["status"]["connected"], true);
        assert_eq!(device_count(&client, addr).await, 1);

        ws.close(None).await.expect("Failed to close");
        drop(ws);

        // The session releases its device once the socket is gone
        let released = tokio::time::timeout(Duration::from_secs(5), async {
            while device_count(&client, addr).await != 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "Session still holds its device");

        let _ = shutdown_tx.send(());
    }
}
