//! Frame types passed between pipeline stages.
//!
//! These are **internal** representations. The serialisable wire shapes
//! live in [`crate::protocol`].

use bytes::Bytes;

use crate::geometry::Size;

// ── FrameSource ──────────────────────────────────────────────────

/// Which transport delivered a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSource {
    /// Raw image bytes in a binary push message.
    BinaryPush,
    /// A base64 `recording_frame` JSON push message.
    JsonPush,
    /// An HTTP poll response.
    Poll,
}

impl FrameSource {
    /// Whether the frame came over the push channel.
    pub fn is_push(self) -> bool {
        matches!(self, FrameSource::BinaryPush | FrameSource::JsonPush)
    }
}

impl std::fmt::Display for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSource::BinaryPush => write!(f, "binary-push"),
            FrameSource::JsonPush => write!(f, "json-push"),
            FrameSource::Poll => write!(f, "poll"),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One encoded screenshot of the remote browser.
///
/// Transient: owned by whichever stage holds it and dropped as soon as
/// a fresher frame supersedes it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (JPEG in practice).
    pub bytes: Bytes,
    /// Bitmap width announced by the transport, if any.
    pub width: Option<u32>,
    /// Bitmap height announced by the transport, if any.
    pub height: Option<u32>,
    /// Server-side capture timestamp.
    pub captured_at: Option<String>,
    /// Server-supplied content hash.
    pub content_hash: Option<String>,
    pub source: FrameSource,
}

impl Frame {
    /// A binary push frame: bytes only, identity is positional.
    pub fn binary(bytes: Bytes) -> Self {
        Self {
            bytes,
            width: None,
            height: None,
            captured_at: None,
            content_hash: None,
            source: FrameSource::BinaryPush,
        }
    }

    /// Encoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Announced size, when both dimensions were sent.
    pub fn announced_size(&self) -> Option<Size> {
        Some(Size::new(self.width?, self.height?))
    }
}

// ── DecodedFrame ─────────────────────────────────────────────────

/// A decoded bitmap ready for drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows (`width * 4 * height` bytes).
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Expected buffer length for the declared dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_frame_has_no_announced_size() {
        let f = Frame::binary(Bytes::from_static(b"\xff\xd8\xff"));
        assert_eq!(f.byte_len(), 3);
        assert_eq!(f.announced_size(), None);
        assert!(f.source.is_push());
    }

    #[test]
    fn poll_is_not_push() {
        assert!(!FrameSource::Poll.is_push());
        assert_eq!(FrameSource::JsonPush.to_string(), "json-push");
    }
}
