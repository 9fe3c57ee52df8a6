//! Engine configuration: endpoints, client count and timing.
//!
//! [`EngineConfig::from_env`] reads the `PUSHPULL_*` variables after
//! `env_config::load_and_apply` has merged `.env` and the XDG config into the process env.

use std::time::Duration;

use env_config::{env_parse, env_string};
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_CLIENT_COUNT: usize = 5;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;
pub const DEFAULT_KEEPALIVE_MS: u64 = 1_000;
pub const DEFAULT_REDRAW_MS: u64 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

pub const ENV_API_BASE: &str = "PUSHPULL_API_BASE";
pub const ENV_WS_BASE: &str = "PUSHPULL_WS_BASE";
pub const ENV_CLIENT_COUNT: &str = "PUSHPULL_CLIENT_COUNT";
pub const ENV_POLL_INTERVAL_MS: &str = "PUSHPULL_POLL_INTERVAL_MS";
pub const ENV_KEEPALIVE_MS: &str = "PUSHPULL_KEEPALIVE_MS";
pub const ENV_REDRAW_MS: &str = "PUSHPULL_REDRAW_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "PUSHPULL_REQUEST_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "PUSHPULL_CONNECT_TIMEOUT_MS";
pub const ENV_EVENT_QUEUE_CAPACITY: &str = "PUSHPULL_EVENT_QUEUE_CAPACITY";

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Base for every HTTP endpoint, e.g. `http://127.0.0.1:8000/api`.
    pub api_base: String,
    /// Base for the push channel; derived from the API origin when `None`.
    pub ws_base: Option<String>,
    /// Clients per mode.
    pub client_count: usize,
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
    /// Snapshot publication and completion re-check cadence.
    pub redraw_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub event_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: None,
            client_count: DEFAULT_CLIENT_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            keepalive_interval: Duration::from_millis(DEFAULT_KEEPALIVE_MS),
            redraw_interval: Duration::from_millis(DEFAULT_REDRAW_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

fn millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(key, default)).max(MIN_INTERVAL)
}

impl EngineConfig {
    /// Builds config from the `PUSHPULL_*` env vars; unset or invalid values use defaults.
    pub fn from_env() -> Self {
        Self {
            api_base: env_string(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            ws_base: env_string(ENV_WS_BASE),
            client_count: env_parse(ENV_CLIENT_COUNT, DEFAULT_CLIENT_COUNT).max(1),
            poll_interval: millis(ENV_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS),
            keepalive_interval: millis(ENV_KEEPALIVE_MS, DEFAULT_KEEPALIVE_MS),
            redraw_interval: millis(ENV_REDRAW_MS, DEFAULT_REDRAW_MS),
            request_timeout: millis(ENV_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: millis(ENV_CONNECT_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS),
            event_queue_capacity: env_parse(ENV_EVENT_QUEUE_CAPACITY, DEFAULT_EVENT_QUEUE_CAPACITY)
                .max(1),
        }
    }

    /// Raises zero durations to 1 ms and zero counts to 1; tokio intervals panic on zero.
    pub fn normalized(self) -> Self {
        Self {
            client_count: self.client_count.max(1),
            poll_interval: self.poll_interval.max(MIN_INTERVAL),
            keepalive_interval: self.keepalive_interval.max(MIN_INTERVAL),
            redraw_interval: self.redraw_interval.max(MIN_INTERVAL),
            request_timeout: self.request_timeout.max(MIN_INTERVAL),
            connect_timeout: self.connect_timeout.max(MIN_INTERVAL),
            event_queue_capacity: self.event_queue_capacity.max(1),
            ..self
        }
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Push-channel base: the configured one, or the API origin with `http` mapped to `ws`
    /// and `https` to `wss`.
    pub fn ws_base(&self) -> Result<String, TransportError> {
        if let Some(base) = &self.ws_base {
            return Ok(base.trim_end_matches('/').to_string());
        }
        let mut url = Url::parse(self.api_base())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported api scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}
