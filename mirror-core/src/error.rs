//! Domain-specific error types for the mirror pipeline.
//!
//! All fallible operations return `Result<T, MirrorError>`.
//! No panics on malformed frames or unexpected server messages — every
//! failure is typed and recoverable on the next natural trigger.

use thiserror::Error;

/// The canonical error type for the mirror pipeline.
#[derive(Debug, Error)]
pub enum MirrorError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// Image bytes could not be decoded into a bitmap.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A decoded bitmap could not be drawn to the canvas.
    #[error("render failed: {0}")]
    Render(String),

    /// A frame carried no image bytes.
    #[error("empty frame")]
    EmptyFrame,

    // ── Transport Errors ─────────────────────────────────────────
    /// The HTTP client reported an error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected HTTP status.
    #[error("unexpected http status {status} from {endpoint}")]
    Status { status: u16, endpoint: &'static str },

    /// A base URL or endpoint could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The push channel is not connected.
    #[error("push channel not connected")]
    NotConnected,

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // ── Serialization Errors ─────────────────────────────────────
    /// A JSON message could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A base64 image payload was malformed.
    #[error("invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    // ── State Errors ─────────────────────────────────────────────
    /// The operation needs a session identifier and none is set.
    #[error("no active session")]
    NoSession,

    /// A state machine transition was not valid from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// The work was cancelled because its session ended.
    #[error("cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Whether the error came from the network rather than from local
    /// decoding or state.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Status { .. }
                | Self::WebSocket(_)
                | Self::NotConnected
                | Self::Io(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for MirrorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        MirrorError::ChannelClosed
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MirrorError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        MirrorError::WebSocket(e.to_string())
    }
}

impl From<image::ImageError> for MirrorError {
    fn from(e: image::ImageError) -> Self {
        MirrorError::Decode(e.to_string())
    }
}
