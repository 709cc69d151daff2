use thiserror::Error;

/// Errors returned by session, preview, and backend operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backend returned a non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response from the backend was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An image payload was not valid base64.
    #[error("Invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Reading a local file for upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation needed an upload that has not been made.
    #[error("No {0} file uploaded")]
    MissingUpload(&'static str),

    /// The session socket was torn down and refuses new connections.
    #[error("Session is closed")]
    Closed,

    /// Configuration was rejected by the builder.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SessionError>;
