//! Mock task backend for pushpull (axum + ws).
//!
//! Serves both task kinds over both transports: push tasks stream frames on
//! `ws://{addr}/ws/tasks/{id}`, naive twins answer the polling endpoints under
//! `http://{addr}/api`. Tasks release their output on a fixed step interval, so a
//! push task and its naive twin produce identical results.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`], [`BackendConfig`].

mod app;
mod connection;
mod pi;
mod response;
mod script;
mod tasks;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use app::{backend_config_from_env, BackendConfig};

use app::{router, AppState};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Runs the backend on an existing listener. Used by tests (bind to 127.0.0.1:0 then pass listener).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    config: BackendConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!(
        step_ms = config.step_interval.as_millis() as u64,
        "task backend listening on http://{}/api (push: ws://{}/ws/tasks)", addr, addr
    );
    let state = Arc::new(AppState::new(config));
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the backend. Listens on `addr` (default 127.0.0.1:8000).
pub async fn run_serve(
    addr: Option<&str>,
    config: BackendConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, config).await
}
