//! Geometry types shared by the mapper, the render pipeline and the
//! input forwarder.
//!
//! Two size types are kept deliberately separate: [`Size`] is a bitmap
//! size in device pixels (what a decoded frame measures), [`Viewport`]
//! is the logical CSS-pixel size the remote browser renders at. Under
//! device-pixel-ratio scaling they differ, and a viewport is never
//! derived from a bitmap.

use serde::{Deserialize, Serialize};

// ── Rect ─────────────────────────────────────────────────────────

/// Container bounding box in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether the rect has no drawable area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

// ── Point ────────────────────────────────────────────────────────

/// A position. In document space for raw pointer input, in viewport
/// space once mapped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ── Size ─────────────────────────────────────────────────────────

/// Bitmap dimensions in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Viewport ─────────────────────────────────────────────────────

/// Logical (CSS-pixel) dimensions of the remote browser.
///
/// Supplied by whoever configured the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ── FrameDimensions ──────────────────────────────────────────────

/// Bitmap dimensions of the most recently rendered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
    /// Server-side capture timestamp, when the transport carried one.
    pub captured_at: Option<String>,
}

impl FrameDimensions {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
