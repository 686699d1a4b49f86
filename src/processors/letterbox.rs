//! Letterbox resizing and the inverse coordinate transform.
//!
//! Detection models consume fixed-size inputs; letterboxing preserves the
//! source aspect ratio by scaling into the target canvas and padding the
//! remainder with a constant fill. The resize metadata is kept so boxes
//! predicted in model-input coordinates can be projected back onto the
//! original image.

use crate::processors::geometry::Rect;
use image::{Rgb, RgbImage, imageops};

/// Resize metadata produced by [`letterbox`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxMeta {
    /// Uniform scale applied to the source image.
    pub scale: f32,
    /// Horizontal padding on the left edge of the canvas.
    pub pad_x: f32,
    /// Vertical padding on the top edge of the canvas.
    pub pad_y: f32,
}

impl LetterboxMeta {
    /// Projects a box from letterboxed coordinates back onto the original
    /// image: padding is removed, then the uniform scale undone.
    ///
    /// With `clip`, the origin is clamped into `[0, original_dim]` and the
    /// size reduced so the box never exceeds the original bounds.
    pub fn restore_rect(&self, rect: Rect, orig_width: u32, orig_height: u32, clip: bool) -> Rect {
        let mut x = (rect.x - self.pad_x) / self.scale;
        let mut y = (rect.y - self.pad_y) / self.scale;
        let mut width = rect.width / self.scale;
        let mut height = rect.height / self.scale;
        if clip {
            x = x.clamp(0.0, orig_width as f32);
            y = y.clamp(0.0, orig_height as f32);
            width = width.min(orig_width as f32 - x);
            height = height.min(orig_height as f32 - y);
        }
        Rect::new(x, y, width, height)
    }

    /// Forward transform: projects a box from original-image coordinates into
    /// letterboxed coordinates.
    pub fn project_rect(&self, rect: Rect) -> Rect {
        Rect::new(
            rect.x * self.scale + self.pad_x,
            rect.y * self.scale + self.pad_y,
            rect.width * self.scale,
            rect.height * self.scale,
        )
    }
}

/// Letterboxes `src` into a `target_width` x `target_height` canvas.
///
/// The source is scaled by `min(tw/sw, th/sh)`, centered, and the canvas
/// filled with `fill` elsewhere. Returns the canvas plus the metadata needed
/// by [`LetterboxMeta::restore_rect`].
pub fn letterbox(
    src: &RgbImage,
    target_width: u32,
    target_height: u32,
    fill: Rgb<u8>,
) -> (RgbImage, LetterboxMeta) {
    let scale = (target_width as f32 / src.width() as f32)
        .min(target_height as f32 / src.height() as f32);
    let new_width = ((src.width() as f32 * scale) as u32).max(1);
    let new_height = ((src.height() as f32 * scale) as u32).max(1);

    let resized = if (new_width, new_height) == src.dimensions() {
        src.clone()
    } else {
        imageops::resize(src, new_width, new_height, imageops::FilterType::Triangle)
    };

    let left = (target_width - new_width) / 2;
    let top = (target_height - new_height) / 2;
    let mut canvas = RgbImage::from_pixel(target_width, target_height, fill);
    imageops::replace(&mut canvas, &resized, i64::from(left), i64::from(top));

    (
        canvas,
        LetterboxMeta {
            scale,
            pad_x: left as f32,
            pad_y: top as f32,
        },
    )
}

/// Rounds `length` up to the next multiple of `pad`.
///
/// Text detection graphs require input sides to be multiples of their stride.
pub fn pad_to_multiple(length: u32, pad: u32) -> u32 {
    let remainder = length % pad;
    if remainder == 0 {
        length
    } else {
        length + pad - remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_centers_and_scales() {
        let src = RgbImage::from_pixel(100, 50, Rgb([10, 20, 30]));
        let (canvas, meta) = letterbox(&src, 64, 64, Rgb([0, 0, 0]));
        assert_eq!(canvas.dimensions(), (64, 64));
        assert!((meta.scale - 0.64).abs() < 1e-6);
        assert_eq!(meta.pad_x, 0.0);
        assert_eq!(meta.pad_y, 16.0);
        // Inside the placed region the source color survives; the padding
        // keeps the fill color.
        assert_eq!(*canvas.get_pixel(32, 32), Rgb([10, 20, 30]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn restore_project_round_trip() {
        let meta = LetterboxMeta {
            scale: 0.5,
            pad_x: 12.0,
            pad_y: 4.0,
        };
        let original = Rect::new(40.0, 60.0, 200.0, 100.0);
        let projected = meta.project_rect(original);
        let restored = meta.restore_rect(projected, 640, 480, false);
        assert!((restored.x - original.x).abs() < 1e-3);
        assert!((restored.y - original.y).abs() < 1e-3);
        assert!((restored.width - original.width).abs() < 1e-3);
        assert!((restored.height - original.height).abs() < 1e-3);
    }

    #[test]
    fn restore_clips_to_original_bounds() {
        let meta = LetterboxMeta {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let rect = Rect::new(-5.0, 90.0, 50.0, 50.0);
        let restored = meta.restore_rect(rect, 100, 100, true);
        assert_eq!(restored.x, 0.0);
        assert!(restored.bottom() <= 100.0);
        assert!(restored.right() <= 100.0);
    }

    #[test]
    fn pad_to_multiple_rounds_up() {
        assert_eq!(pad_to_multiple(64, 32), 64);
        assert_eq!(pad_to_multiple(65, 32), 96);
        assert_eq!(pad_to_multiple(1, 32), 32);
    }
}
