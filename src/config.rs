use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default backend address used by the web dashboard.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

pub(crate) fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Derive the progress socket address from an HTTP endpoint.
pub(crate) fn ws_url_for(endpoint: &str) -> String {
    format!(
        "{}/ws",
        endpoint
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    )
}

/// Configuration for a face-swap session.
///
/// Use [`SessionConfig::builder()`] for ergonomic construction, or
/// [`SessionConfig::default()`] for a backend on `localhost:8000`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the REST API, without trailing slash.
    pub endpoint: String,

    /// Address of the progress WebSocket. Fixed for the life of the session.
    pub ws_url: String,

    /// Fixed delay between a dropped connection and the next attempt.
    pub reconnect_delay: Duration,

    /// Quiescence window before a preview request is issued.
    pub preview_debounce: Duration,

    /// Number of log lines retained in the session state.
    pub log_capacity: usize,

    /// Timeout for JSON requests (detect, preview, video info, start).
    pub request_timeout: Duration,

    /// Timeout for multipart uploads and output downloads.
    pub upload_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ws_url: ws_url_for(DEFAULT_ENDPOINT),
            reconnect_delay: Duration::from_secs(3),
            preview_debounce: Duration::from_millis(300),
            log_capacity: 100,
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
        }
    }
}

impl SessionConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Defaults, with `FACEFUSION_API_URL` and `FACEFUSION_WS_URL` applied
    /// when set.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(endpoint) = std::env::var("FACEFUSION_API_URL") {
            builder = builder.with_endpoint(endpoint);
        }
        if let Ok(ws_url) = std::env::var("FACEFUSION_WS_URL") {
            builder = builder.with_ws_url(ws_url);
        }
        builder.build()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
    explicit_ws_url: Option<String>,
}

impl SessionConfigBuilder {
    /// Set the REST endpoint. The socket address follows it unless
    /// [`with_ws_url`](Self::with_ws_url) is also given.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = normalize(endpoint.into());
        self
    }

    /// Set an explicit WebSocket address.
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.explicit_ws_url = Some(url.into());
        self
    }

    /// Set the delay between reconnection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Set the preview quiescence window.
    pub fn with_preview_debounce(mut self, debounce: Duration) -> Self {
        self.config.preview_debounce = debounce;
        self
    }

    /// Set how many log lines are kept.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.config.log_capacity = capacity;
        self
    }

    /// Set the timeout for JSON requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout for uploads and downloads.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.config.upload_timeout = timeout;
        self
    }

    /// Validate and build the final [`SessionConfig`].
    pub fn build(mut self) -> Result<SessionConfig> {
        if self.config.endpoint.is_empty() {
            return Err(SessionError::InvalidConfig("endpoint is empty".into()));
        }
        if self.config.log_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "log capacity must be at least 1".into(),
            ));
        }
        self.config.ws_url = match self.explicit_ws_url {
            Some(url) => url,
            None => ws_url_for(&self.config.endpoint),
        };
        Ok(self.config)
    }
}
