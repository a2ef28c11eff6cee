//! Display output — writes the mirrored canvas to disk.
//!
//! The viewer is headless, so "displaying" a frame means encoding the
//! canvas backing store as a PNG snapshot on request.

use std::path::Path;

use image::{ImageFormat, RgbaImage};
use mirror_core::{Canvas, SoftwareCanvas};

/// Encode the canvas as PNG at `path`.
///
/// Fails when nothing has been rendered yet.
pub fn write_snapshot(canvas: &SoftwareCanvas, path: &Path) -> Result<(), String> {
    let size = canvas.size();
    if size.is_empty() {
        return Err("no frame rendered yet".into());
    }
    let img = RgbaImage::from_raw(size.width, size.height, canvas.pixels().to_vec())
        .ok_or_else(|| format!("canvas buffer does not match {size}"))?;
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| format!("write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::Size;
    use mirror_core::stream::DecodedFrame;

    #[test]
    fn empty_canvas_is_refused() {
        let canvas = SoftwareCanvas::new();
        assert!(write_snapshot(&canvas, Path::new("unused.png")).is_err());
    }

    #[test]
    fn snapshot_roundtrips_pixels() {
        let mut canvas = SoftwareCanvas::new();
        canvas.resize(Size::new(3, 2));
        canvas
            .draw(&DecodedFrame {
                width: 3,
                height: 2,
                pixels: vec![200; 24],
            })
            .unwrap();

        let path = std::env::temp_dir().join(format!("mirror-snap-{}.png", std::process::id()));
        write_snapshot(&canvas, &path).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(2, 1).0, [200, 200, 200, 200]);
        let _ = std::fs::remove_file(&path);
    }
}
