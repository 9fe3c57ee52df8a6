//! Shared helpers for e2e tests. Received frames are logged with `[e2e] received: ...`.
//! Run tests with `--nocapture` to see them.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Fast pacing so a whole task plays out in well under a second.
pub fn fast_config() -> serve::BackendConfig {
    serve::BackendConfig {
        step_interval: Duration::from_millis(5),
        ..serve::BackendConfig::default()
    }
}

/// Bind to a random port and spawn the backend. Returns (http_base, ws_base, server_handle).
pub async fn spawn_server(
    config: serve::BackendConfig,
) -> (
    String,
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let http = format!("http://{}/api", addr);
    let ws = format!("ws://{}", addr);
    let server_handle = tokio::spawn(serve::run_serve_on_listener(listener, config));
    (http, ws, server_handle)
}

pub async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

pub async fn get_json(url: &str, query: &[(&str, String)]) -> (u16, Value) {
    let resp = reqwest::Client::new().get(url).query(query).send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Reads text frames until the server closes the channel. Each frame is parsed as JSON.
pub async fn read_all_frames<R>(read: &mut R, read_timeout: Duration) -> Vec<Value>
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut frames = Vec::new();
    loop {
        let next = timeout(read_timeout, read.next())
            .await
            .expect("timeout waiting for frame");
        match next {
            Some(Ok(Message::Text(text))) => {
                eprintln!("[e2e] received: {}", text);
                frames.push(serde_json::from_str(&text).unwrap());
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("read error: {}", e),
        }
    }
    frames
}
