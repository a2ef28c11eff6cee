//! Screen → viewport coordinate mapping.
//!
//! The mirrored frame is drawn "contain"-fitted and centred inside its
//! container, so a pointer position must first be located inside the
//! letterboxed image and then rescaled into the remote browser's
//! logical viewport. Frame size and viewport size are two independent
//! scales: the first only decides where the image sits on screen, the
//! second decides what a position inside it means. Keeping them apart
//! is what makes the result independent of device pixel ratio.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::geometry::{Point, Rect, Size, Viewport};

/// Map a document-space pointer position into viewport space.
///
/// Positions in the letterbox margins clamp to the nearest image edge.
/// The result always lies in `[0, viewport.width] × [0, viewport.height]`.
/// Degenerate geometry (empty frame or container, non-finite input)
/// maps to the origin.
pub fn map_to_viewport(client: Point, container: &Rect, frame: Size, viewport: Viewport) -> Point {
    if frame.is_empty() || container.is_empty() || viewport.is_empty() {
        return Point::ORIGIN;
    }

    let frame_w = frame.width as f64;
    let frame_h = frame.height as f64;

    let scale = (container.width / frame_w).min(container.height / frame_h);
    let display_w = frame_w * scale;
    let display_h = frame_h * scale;

    let offset_x = (container.width - display_w) / 2.0;
    let offset_y = (container.height - display_h) / 2.0;

    let rel_x = clamp_finite(client.x - container.left - offset_x, display_w);
    let rel_y = clamp_finite(client.y - container.top - offset_y, display_h);

    let vw = viewport.width as f64;
    let vh = viewport.height as f64;
    Point {
        x: (rel_x / display_w * vw).min(vw),
        y: (rel_y / display_h * vh).min(vh),
    }
}

fn clamp_finite(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}

// ── Viewport resolution ──────────────────────────────────────────

/// How a mapping obtained its target viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    /// The logical viewport was supplied by the session collaborator.
    Logical,
    /// No viewport was known; the frame bitmap size stood in for it.
    /// Not correct on HiDPI remotes.
    FrameFallback,
}

/// Pick the viewport to map into.
///
/// Falls back to the frame bitmap size when no logical viewport is
/// known. That path is wrong whenever the remote renders at a device
/// pixel ratio other than 1, so callers should surface it.
pub fn resolve_viewport(viewport: Option<Viewport>, frame: Size) -> (Viewport, MappingMode) {
    match viewport {
        Some(v) if !v.is_empty() => (v, MappingMode::Logical),
        _ => (
            Viewport::new(frame.width, frame.height),
            MappingMode::FrameFallback,
        ),
    }
}

// ── CoordinateMapper ─────────────────────────────────────────────

/// Mapper holding the externally supplied viewport.
///
/// Warns once per viewport change when it has to run in
/// [`MappingMode::FrameFallback`].
#[derive(Debug, Default)]
pub struct CoordinateMapper {
    viewport: Option<Viewport>,
    fallback_warned: AtomicBool,
}

impl CoordinateMapper {
    pub fn new(viewport: Option<Viewport>) -> Self {
        Self {
            viewport,
            fallback_warned: AtomicBool::new(false),
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
        self.fallback_warned.store(false, Ordering::Relaxed);
    }

    /// Map `client` into viewport space, reporting which mode was used.
    pub fn map(&self, client: Point, container: &Rect, frame: Size) -> (Point, MappingMode) {
        let (viewport, mode) = resolve_viewport(self.viewport, frame);
        if mode == MappingMode::FrameFallback && !self.fallback_warned.swap(true, Ordering::Relaxed) {
            warn!(
                frame = %frame,
                "no logical viewport known; mapping input against frame bitmap size (HiDPI remotes will be off)"
            );
        }
        (map_to_viewport(client, container, frame, viewport), mode)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: Rect = Rect::new(0.0, 0.0, 1200.0, 700.0);

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn letterboxed_center_maps_to_viewport_center() {
        let viewport = Viewport::new(900, 700);
        let p = map_to_viewport(
            Point::new(600.0, 350.0),
            &CONTAINER,
            Size::new(900, 700),
            viewport,
        );
        assert_close(p, Point::new(450.0, 350.0));
    }

    #[test]
    fn hidpi_frame_does_not_leak_into_output() {
        let viewport = Viewport::new(900, 700);
        for &(x, y) in &[(600.0, 350.0), (200.0, 10.0), (1049.0, 699.0), (151.0, 1.0)] {
            let at_1x = map_to_viewport(Point::new(x, y), &CONTAINER, Size::new(900, 700), viewport);
            let at_2x = map_to_viewport(Point::new(x, y), &CONTAINER, Size::new(1800, 1400), viewport);
            assert_close(at_1x, at_2x);
        }
    }

    #[test]
    fn letterbox_margin_clamps_to_edge() {
        let viewport = Viewport::new(900, 700);
        let left = map_to_viewport(Point::new(20.0, 100.0), &CONTAINER, Size::new(900, 700), viewport);
        assert_eq!(left.x, 0.0);
        let right = map_to_viewport(Point::new(1190.0, 100.0), &CONTAINER, Size::new(900, 700), viewport);
        assert_eq!(right.x, 900.0);
    }

    #[test]
    fn output_is_always_clamped() {
        let containers = [
            Rect::new(0.0, 0.0, 1200.0, 700.0),
            Rect::new(37.5, 80.0, 320.0, 900.0),
            Rect::new(-50.0, -10.0, 10.0, 10.0),
        ];
        let frames = [Size::new(1280, 800), Size::new(2560, 1600), Size::new(3, 1000)];
        let viewports = [Viewport::new(1280, 800), Viewport::new(390, 844), Viewport::new(1, 1)];
        let clicks = [-1e6, -3.0, 0.0, 17.25, 500.0, 1e6];

        for c in &containers {
            for &f in &frames {
                for &v in &viewports {
                    for &cx in &clicks {
                        for &cy in &clicks {
                            let p = map_to_viewport(Point::new(cx, cy), c, f, v);
                            assert!(p.x >= 0.0 && p.x <= v.width as f64, "{p:?} outside {v:?}");
                            assert!(p.y >= 0.0 && p.y <= v.height as f64, "{p:?} outside {v:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn offset_container_is_respected() {
        let container = Rect::new(100.0, 50.0, 800.0, 600.0);
        let p = map_to_viewport(
            Point::new(500.0, 350.0),
            &container,
            Size::new(1600, 1200),
            Viewport::new(800, 600),
        );
        assert_close(p, Point::new(400.0, 300.0));
    }

    #[test]
    fn degenerate_geometry_maps_to_origin() {
        let v = Viewport::new(900, 700);
        assert_eq!(
            map_to_viewport(Point::new(5.0, 5.0), &CONTAINER, Size::new(0, 700), v),
            Point::ORIGIN
        );
        assert_eq!(
            map_to_viewport(Point::new(5.0, 5.0), &Rect::default(), Size::new(900, 700), v),
            Point::ORIGIN
        );
        let nan = map_to_viewport(Point::new(f64::NAN, 350.0), &CONTAINER, Size::new(900, 700), v);
        assert_eq!(nan.x, 0.0);
    }

    #[test]
    fn fallback_uses_frame_size() {
        let mapper = CoordinateMapper::new(None);
        let (p, mode) = mapper.map(Point::new(600.0, 350.0), &CONTAINER, Size::new(1800, 1400));
        assert_eq!(mode, MappingMode::FrameFallback);
        assert_close(p, Point::new(900.0, 700.0));

        let mapper = CoordinateMapper::new(Some(Viewport::new(900, 700)));
        let (p, mode) = mapper.map(Point::new(600.0, 350.0), &CONTAINER, Size::new(1800, 1400));
        assert_eq!(mode, MappingMode::Logical);
        assert_close(p, Point::new(450.0, 350.0));
    }
}
