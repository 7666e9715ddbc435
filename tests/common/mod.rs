//! Shared helpers for behaviour tests.

use std::collections::BTreeMap;
use std::sync::Once;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use drydock::{Credentials, EnvironmentConfig, EnvironmentDetails};

static INIT: Once = Once::new();

/// Initialise tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Configuration tuned for fast polling in tests.
pub fn fast_config() -> EnvironmentConfig {
    EnvironmentConfig {
        image: String::from("localstack/localstack:3.8"),
        service_port: 4566,
        access_key: String::from("test"),
        secret_key: String::from("test"),
        region: String::from("us-east-1"),
        docker_bin: String::from("docker"),
        startup_timeout_secs: 1,
        poll_interval_ms: 10,
        confirm_timeout_secs: 1,
        sweep_retry_limit: 3,
        sweep_retry_backoff_ms: 1,
        route_overrides: vec![
            String::from("station-x=beer"),
            String::from("station-y=wine-cooler"),
        ],
    }
}

/// Serves a canned health-endpoint response on an ephemeral port.
pub async fn spawn_health_server(body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind health listener");
    let port = listener.local_addr().expect("listener address").port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut request = [0_u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });
    port
}

/// Placeholder environment details for harnesses built over an in-memory
/// store.
pub fn placeholder_details() -> EnvironmentDetails {
    EnvironmentDetails {
        endpoint: String::from("http://127.0.0.1:0"),
        credentials: Credentials {
            access_key: String::from("test"),
            secret_key: String::from("test"),
        },
        region: String::from("us-east-1"),
        config_overrides: BTreeMap::new(),
    }
}
