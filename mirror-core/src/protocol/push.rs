//! Push channel messages.
//!
//! # Wire Protocol
//!
//! Text messages are JSON objects tagged by `type`. Binary messages are
//! raw encoded images with no envelope; the channel they arrive on
//! scopes them to the subscribed session.
//!
//! ## Subscribe
//! ```text
//! Client ──[subscribe_recording {session_id}]────► Server
//! Server ──[recording_subscribed {session_id}]───► Client   (ack)
//! ```
//!
//! ## Frames (continuous)
//! ```text
//! Server ──[binary: JPEG bytes]──────────────────► Client   (preferred)
//! Server ──[recording_frame {image: base64, ..}]─► Client   (legacy)
//! Server ──[recording_stats {session_id, stats}]─► Client   (periodic)
//! ```
//!
//! ## Input / Unsubscribe
//! ```text
//! Client ──[recording_input {session_id, input}]─► Server
//! Client ──[unsubscribe_recording]───────────────► Server
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::protocol::input::InputPayload;
use crate::stats::ServerFrameStats;
use crate::stream::types::{Frame, FrameSource};

// ── Client → Server ──────────────────────────────────────────────

/// Messages the client sends over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeRecording { session_id: String },
    UnsubscribeRecording {},
    RecordingInput { session_id: String, input: InputPayload },
}

impl ClientMessage {
    /// Serialize to a JSON text message.
    pub fn to_json(&self) -> Result<String, MirrorError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Server → Client ──────────────────────────────────────────────

/// Text messages the server sends over the push channel.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription acknowledgement.
    RecordingSubscribed {
        session_id: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// Legacy base64 frame.
    RecordingFrame(FramePayload),
    /// Server-computed pipeline statistics.
    RecordingStats {
        session_id: String,
        stats: ServerFrameStats,
    },
    /// Any message type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse a JSON text message.
    pub fn from_json(text: &str) -> Result<Self, MirrorError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Session the message is addressed to, if it names one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ServerMessage::RecordingSubscribed { session_id, .. }
            | ServerMessage::RecordingStats { session_id, .. } => Some(session_id),
            ServerMessage::RecordingFrame(payload) => Some(&payload.session_id),
            ServerMessage::Unknown => None,
        }
    }
}

/// Body of a `recording_frame` message.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FramePayload {
    pub session_id: String,
    /// Base64-encoded image bytes.
    pub image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub captured_at: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
}

impl FramePayload {
    /// Decode the base64 image into a pipeline [`Frame`].
    pub fn into_frame(self) -> Result<Frame, MirrorError> {
        let bytes = decode_image(&self.image)?;
        Ok(Frame {
            bytes,
            width: Some(self.width),
            height: Some(self.height),
            captured_at: self.captured_at,
            content_hash: self.content_hash,
            source: FrameSource::JsonPush,
        })
    }
}

/// Decode a base64 image field, tolerating a `data:` URL prefix.
pub(crate) fn decode_image(image: &str) -> Result<Bytes, MirrorError> {
    let raw = match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image,
    };
    let bytes = STANDARD.decode(raw.trim())?;
    if bytes.is_empty() {
        return Err(MirrorError::EmptyFrame);
    }
    Ok(Bytes::from(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────
