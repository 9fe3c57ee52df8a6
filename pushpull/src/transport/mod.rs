//! Transport seam: one-shot JSON calls and the long-lived push channel.
//!
//! [`TransportClient`] reports transport-level failures only; status codes and bodies are
//! handed back uninterpreted so the sessions can count every unit they receive.

mod http;

pub use http::{HttpTransport, WsChannel};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EngineError, TransportError};

/// Status code and raw body of one HTTP round-trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raw body length in bytes.
    pub fn bytes(&self) -> u64 {
        self.body.len() as u64
    }

    /// Decodes a successful body. Non-2xx responses are decode errors too.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        if !self.is_success() {
            return Err(EngineError::Decode(format!("status {}", self.status)));
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// One inbound push-channel frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    /// Raw payload length.
    pub bytes: u64,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            bytes: text.len() as u64,
            text,
        }
    }
}

#[async_trait]
pub trait TransportClient: Send + Sync {
    /// `POST <api base><path>` with a JSON body.
    async fn post_json(&self, path: &str, body: &Value) -> Result<HttpResponse, TransportError>;

    /// `GET <api base><path>?<query>`.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError>;

    /// Opens the push channel for `task_id`.
    async fn open_channel(&self, task_id: &str) -> Result<Box<dyn PushChannel>, TransportError>;
}

#[async_trait]
pub trait PushChannel: Send {
    /// Next data frame; `None` once the peer closed the channel.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn send_keepalive(&mut self) -> Result<(), TransportError>;

    /// Best-effort close; errors are ignored.
    async fn close(&mut self);
}
