//! reqwest + tokio-tungstenite implementation of [`TransportClient`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use task_event::KEEPALIVE_TEXT;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{Frame, HttpResponse, PushChannel, TransportClient};
use crate::config::EngineConfig;
use crate::error::TransportError;

pub struct HttpTransport {
    client: reqwest::Client,
    api_base: String,
    ws_base: String,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let api_base = config.api_base().to_string();
        Url::parse(&api_base).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", api_base, e)))?;
        Ok(Self {
            client,
            api_base,
            ws_base: config.ws_base()?,
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
        })
    }

    /// Appends `path` to the API base. `Url::join` would drop the base's last segment.
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    fn map_err(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }

    async fn finish(&self, resp: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.map_err(e))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        self.finish(resp).await
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        self.finish(resp).await
    }

    async fn open_channel(&self, task_id: &str) -> Result<Box<dyn PushChannel>, TransportError> {
        let raw = format!("{}/ws/tasks/{}", self.ws_base, task_id);
        let url = Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)))?;
        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsChannel { stream }))
    }
}

/// WebSocket push channel.
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Request(e.to_string()))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(Frame::text(text))),
                Message::Binary(data) => {
                    return Some(Ok(Frame {
                        bytes: data.len() as u64,
                        text: String::from_utf8_lossy(&data).into_owned(),
                    }))
                }
                Message::Close(_) => return None,
                // Control frames; tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn send_keepalive(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(KEEPALIVE_TEXT.to_string()))
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed => TransportError::Closed,
                other => TransportError::Request(other.to_string()),
            })
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_api_prefix() {
        let t = HttpTransport::new(&EngineConfig {
            api_base: "http://127.0.0.1:8000/api/".into(),
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(
            t.endpoint("/naive/check_progress").unwrap().as_str(),
            "http://127.0.0.1:8000/api/naive/check_progress"
        );
        assert_eq!(t.ws_base, "ws://127.0.0.1:8000");
    }

    #[test]
    fn bad_api_base_is_rejected() {
        let r = HttpTransport::new(&EngineConfig {
            api_base: "not a url".into(),
            ..EngineConfig::default()
        });
        assert!(matches!(r, Err(TransportError::InvalidUrl(_))));
    }
}
