//! Rectangles for layer placement and source cropping.
//!
//! [`LayerRect`] is normalized to the output canvas (`0.0..=1.0`).
//! [`CropWindow`] is in source pixels.

use serde::{Deserialize, Serialize};

/// A rectangle on the output canvas, normalized to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerRect {
    /// Left edge (normalized).
    pub x: f64,
    /// Top edge (normalized).
    pub y: f64,
    /// Width (normalized).
    pub width: f64,
    /// Height (normalized).
    pub height: f64,
}

impl LayerRect {
    /// The whole canvas.
    pub const FULL: LayerRect = LayerRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Create a rect, clamping values to the canvas.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let width = width.clamp(0.01, 1.0);
        let height = height.clamp(0.01, 1.0);
        Self {
            x: x.clamp(0.0, 1.0 - width),
            y: y.clamp(0.0, 1.0 - height),
            width,
            height,
        }
    }

    /// Clamp an arbitrary (possibly user-supplied) rect onto the canvas.
    pub fn clamped(&self) -> Self {
        Self::new(self.x, self.y, self.width, self.height)
    }

    /// Pixel rectangle `(x, y, w, h)` on a canvas, with even sizes.
    pub fn to_pixels(&self, canvas_w: u32, canvas_h: u32) -> (u32, u32, u32, u32) {
        let r = self.clamped();
        let w = even((r.width * canvas_w as f64).round() as u32).max(2);
        let h = even((r.height * canvas_h as f64).round() as u32).max(2);
        let x = (r.x * canvas_w as f64).round() as u32;
        let y = (r.y * canvas_h as f64).round() as u32;
        (x.min(canvas_w.saturating_sub(w)), y.min(canvas_h.saturating_sub(h)), w, h)
    }
}

impl Default for LayerRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// A crop window inside the source frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CropWindow {
    /// Largest window of the given aspect (width / height) that fits the source.
    pub fn largest_for_aspect(source_w: u32, source_h: u32, aspect: f64) -> Self {
        let source_w = source_w.max(2);
        let source_h = source_h.max(2);
        let source_aspect = source_w as f64 / source_h as f64;
        let (w, h) = if source_aspect > aspect {
            (
                even((source_h as f64 * aspect).round() as u32).clamp(2, source_w),
                even(source_h).max(2),
            )
        } else {
            (
                even(source_w).max(2),
                even((source_w as f64 / aspect).round() as u32).clamp(2, source_h),
            )
        };
        Self {
            x: (source_w - w) / 2,
            y: (source_h - h) / 2,
            w,
            h,
        }
    }

    /// Move the window so its center sits at `(cx, cy)`, clamped to the source bounds.
    pub fn centered_on(self, cx: f64, cy: f64, source_w: u32, source_h: u32) -> Self {
        let max_x = source_w.saturating_sub(self.w) as f64;
        let max_y = source_h.saturating_sub(self.h) as f64;
        let x = (cx - self.w as f64 / 2.0).clamp(0.0, max_x).round() as u32;
        let y = (cy - self.h as f64 / 2.0).clamp(0.0, max_y).round() as u32;
        Self { x, y, ..self }
    }

    /// Center point of the window.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }
}

/// Round down to an even number (encoders reject odd chroma dimensions).
pub fn even(value: u32) -> u32 {
    value & !1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_window_for_portrait_from_landscape() {
        let crop = CropWindow::largest_for_aspect(1920, 1080, 9.0 / 16.0);
        assert_eq!(crop.h, 1080);
        assert_eq!(crop.w, 608);
        assert_eq!(crop.x, (1920 - 608) / 2);
        assert!(crop.x + crop.w <= 1920);
    }

    #[test]
    fn test_largest_window_for_landscape_from_portrait() {
        let crop = CropWindow::largest_for_aspect(1080, 1920, 16.0 / 9.0);
        assert_eq!(crop.w, 1080);
        assert_eq!(crop.h, 608);
        assert!(crop.y + crop.h <= 1920);
    }

    #[test]
    fn test_centered_on_clamps_to_bounds() {
        let crop = CropWindow::largest_for_aspect(1920, 1080, 9.0 / 16.0);
        let left = crop.centered_on(10.0, 540.0, 1920, 1080);
        assert_eq!(left.x, 0);
        let right = crop.centered_on(1910.0, 540.0, 1920, 1080);
        assert_eq!(right.x + right.w, 1920);
        let middle = crop.centered_on(960.0, 540.0, 1920, 1080);
        assert!((middle.center().0 - 960.0).abs() <= 1.0);
    }

    #[test]
    fn test_layer_rect_to_pixels() {
        let rect = LayerRect::new(0.5, 0.25, 0.25, 0.5);
        assert_eq!(rect.to_pixels(1080, 1920), (540, 480, 270, 960));
        assert_eq!(LayerRect::FULL.to_pixels(1080, 1920), (0, 0, 1080, 1920));
    }

    #[test]
    fn test_layer_rect_clamps_overflow() {
        let rect = LayerRect::new(0.9, 0.9, 0.5, 0.5);
        assert!(rect.x + rect.width <= 1.0 + 1e-9);
        assert!(rect.y + rect.height <= 1.0 + 1e-9);
    }
}
