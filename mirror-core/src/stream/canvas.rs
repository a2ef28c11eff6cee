//! Render targets.
//!
//! The render pipeline draws decoded bitmaps into a [`Canvas`]. Its
//! backing store has its own size, which follows the bitmap: when a
//! frame arrives with different dimensions the canvas is resized first
//! and then drawn, otherwise it is drawn in place.

use crate::error::MirrorError;
use crate::geometry::Size;
use crate::stream::types::DecodedFrame;

/// A drawable surface with a resizable backing store.
pub trait Canvas: Send {
    /// Current backing-store size.
    fn size(&self) -> Size;

    /// Reallocate the backing store.
    fn resize(&mut self, size: Size);

    /// Draw `frame`, whose size must match the backing store.
    fn draw(&mut self, frame: &DecodedFrame) -> Result<(), MirrorError>;

    /// Release the backing store. The size becomes empty until the next
    /// resize.
    fn clear(&mut self);
}

// ── SoftwareCanvas ───────────────────────────────────────────────

/// In-memory RGBA8 canvas.
#[derive(Debug, Default, Clone)]
pub struct SoftwareCanvas {
    size: Size,
    pixels: Vec<u8>,
    resizes: u64,
    draws: u64,
}

impl SoftwareCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tightly packed RGBA8 rows.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value at `(x, y)`, if inside the backing store.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let offset = (y as usize * self.size.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|p| p.try_into().ok())
    }

    /// Number of backing-store reallocations so far.
    pub fn resize_count(&self) -> u64 {
        self.resizes
    }

    /// Number of frames drawn so far.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }
}

impl Canvas for SoftwareCanvas {
    fn size(&self) -> Size {
        self.size
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.pixels = vec![0u8; size.width as usize * size.height as usize * 4];
        self.resizes += 1;
    }

    fn draw(&mut self, frame: &DecodedFrame) -> Result<(), MirrorError> {
        if frame.size() != self.size {
            return Err(MirrorError::Render(format!(
                "bitmap {} does not match canvas {}",
                frame.size(),
                self.size
            )));
        }
        let expected = frame.expected_len();
        if frame.pixels.len() < expected {
            return Err(MirrorError::Render(format!(
                "bitmap too short: {} < {}",
                frame.pixels.len(),
                expected
            )));
        }
        self.pixels.copy_from_slice(&frame.pixels[..expected]);
        self.draws += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.size = Size::default();
        self.pixels = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(w: u32, h: u32, fill: u8) -> DecodedFrame {
        DecodedFrame {
            width: w,
            height: h,
            pixels: vec![fill; (w * h * 4) as usize],
        }
    }

    #[test]
    fn draw_requires_matching_size() {
        let mut canvas = SoftwareCanvas::new();
        assert!(canvas.draw(&bitmap(2, 2, 1)).is_err());

        canvas.resize(Size::new(2, 2));
        canvas.draw(&bitmap(2, 2, 7)).unwrap();
        assert_eq!(canvas.pixel(1, 1), Some([7, 7, 7, 7]));
        assert_eq!(canvas.pixel(2, 0), None);
        assert_eq!(canvas.draw_count(), 1);
        assert_eq!(canvas.resize_count(), 1);
    }

    #[test]
    fn clear_drops_pixels() {
        let mut canvas = SoftwareCanvas::new();
        canvas.resize(Size::new(2, 2));
        canvas.draw(&bitmap(2, 2, 3)).unwrap();

        canvas.clear();
        assert!(canvas.size().is_empty());
        assert!(canvas.pixels().is_empty());
        assert_eq!(canvas.pixel(0, 0), None);
        assert!(canvas.draw(&bitmap(2, 2, 3)).is_err());
    }

    #[test]
    fn short_bitmap_is_rejected() {
        let mut canvas = SoftwareCanvas::new();
        canvas.resize(Size::new(2, 2));
        let mut b = bitmap(2, 2, 0);
        b.pixels.truncate(3);
        assert!(matches!(canvas.draw(&b), Err(MirrorError::Render(_))));
    }
}
