//! Frame decoder.
//!
//! Turns encoded image bytes received from either transport into an
//! RGBA bitmap that can be drawn on the canvas. Decoding runs on the
//! blocking pool so a large JPEG never stalls the runtime thread that
//! handles input.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::MirrorError;
use crate::stream::types::DecodedFrame;

// ── FrameDecoder ─────────────────────────────────────────────────

/// Asynchronous bitmap decoder.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn decode(&self, bytes: Bytes) -> Result<DecodedFrame, MirrorError>;
}

// ── ImageFrameDecoder ────────────────────────────────────────────

/// Decoder backed by the `image` crate (JPEG and PNG).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFrameDecoder;

impl ImageFrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode on the calling thread.
    pub fn decode_blocking(bytes: &[u8]) -> Result<DecodedFrame, MirrorError> {
        if bytes.is_empty() {
            return Err(MirrorError::EmptyFrame);
        }
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(DecodedFrame {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[async_trait]
impl FrameDecoder for ImageFrameDecoder {
    async fn decode(&self, bytes: Bytes) -> Result<DecodedFrame, MirrorError> {
        tokio::task::spawn_blocking(move || Self::decode_blocking(&bytes))
            .await
            .map_err(|e| MirrorError::Decode(format!("decode task failed: {e}")))?
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, fill: [u8; 4]) -> Bytes {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(fill)));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn decodes_png() {
        let dec = ImageFrameDecoder::new();
        let frame = dec.decode(png(8, 4, [10, 20, 30, 255])).await.unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.pixels.len(), frame.expected_len());
        assert_eq!(&frame.pixels[..4], &[10, 20, 30, 255]);
    }

    #[tokio::test]
    async fn decodes_jpeg() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(16, 16, image::Rgb([200, 200, 200])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Jpeg(80)).unwrap();

        let frame = ImageFrameDecoder::new()
            .decode(Bytes::from(out.into_inner()))
            .await
            .unwrap();
        assert_eq!(frame.size(), crate::geometry::Size::new(16, 16));
    }

    #[tokio::test]
    async fn garbage_is_a_decode_error() {
        let err = ImageFrameDecoder::new()
            .decode(Bytes::from_static(b"definitely not an image"))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Decode(_)));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            ImageFrameDecoder::decode_blocking(&[]),
            Err(MirrorError::EmptyFrame)
        ));
    }
}
