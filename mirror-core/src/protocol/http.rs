//! HTTP fallback payloads.
//!
//! ```text
//! GET  /recordings/live/{session}/frame?quality=N   (If-None-Match: <etag>)
//!   304  → nothing changed
//!   200  → LiveFrameResponse + ETag header
//!
//! POST /recordings/live/{session}/input             body: InputPayload
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::protocol::push::decode_image;
use crate::stream::types::{Frame, FrameSource};

/// Body of a `200` frame poll response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LiveFrameResponse {
    /// Base64-encoded image bytes.
    pub image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub captured_at: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

impl LiveFrameResponse {
    /// Page metadata carried alongside the frame, if any.
    pub fn page_metadata(&self) -> Option<PageMetadata> {
        if self.page_title.is_none() && self.page_url.is_none() {
            return None;
        }
        Some(PageMetadata {
            title: self.page_title.clone(),
            url: self.page_url.clone(),
        })
    }

    /// Decode the base64 image into a pipeline [`Frame`].
    pub fn into_frame(self) -> Result<Frame, MirrorError> {
        let bytes = decode_image(&self.image)?;
        Ok(Frame {
            bytes,
            width: Some(self.width),
            height: Some(self.height),
            captured_at: self.captured_at,
            content_hash: self.content_hash,
            source: FrameSource::Poll,
        })
    }
}

/// Title and URL of the page the remote browser is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_response_parses() {
        let r: LiveFrameResponse =
            serde_json::from_str(r#"{"image":"AAEC","width":2,"height":1}"#).unwrap();
        assert_eq!(r.page_metadata(), None);
        let frame = r.into_frame().unwrap();
        assert_eq!(&frame.bytes[..], &[0u8, 1, 2]);
        assert_eq!(frame.source, FrameSource::Poll);
        assert_eq!(frame.content_hash, None);
    }

    #[test]
    fn page_metadata_is_extracted() {
        let r: LiveFrameResponse = serde_json::from_str(
            r#"{"image":"AAEC","width":2,"height":1,"page_title":"Inbox","page_url":"https://mail.example/"}"#,
        )
        .unwrap();
        let meta = r.page_metadata().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Inbox"));
        assert_eq!(meta.url.as_deref(), Some("https://mail.example/"));
    }
}
