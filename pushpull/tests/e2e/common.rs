//! Shared helpers for e2e tests: a mock backend on a random port and an engine pointed at it.

use std::sync::Arc;
use std::time::Duration;

use pushpull::{EngineConfig, HttpTransport, RunController, RunState};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Bind to a random port and spawn the mock backend. Returns (api_base, server_handle).
pub async fn spawn_backend(
    step_interval: Duration,
) -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = serve::BackendConfig {
        step_interval,
        ..serve::BackendConfig::default()
    };
    let server_handle = tokio::spawn(serve::run_serve_on_listener(listener, config));
    (format!("http://{}/api", addr), server_handle)
}

/// Engine config for tests: small fleet, fast polling and redraw.
pub fn engine_config(api_base: &str, clients: usize) -> EngineConfig {
    EngineConfig {
        api_base: api_base.to_string(),
        client_count: clients,
        poll_interval: Duration::from_millis(20),
        keepalive_interval: Duration::from_millis(200),
        redraw_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

pub fn controller(config: EngineConfig) -> RunController {
    let transport = Arc::new(HttpTransport::new(&config).unwrap());
    RunController::new(config, transport)
}

/// Waits for DONE or ERROR, failing the test after `limit`.
pub async fn settle(controller: &RunController, limit: Duration) -> RunState {
    timeout(limit, controller.wait_until_settled())
        .await
        .expect("run did not settle in time")
}
