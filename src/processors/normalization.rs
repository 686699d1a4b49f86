//! Channel reordering and normalization for tensor marshaling.
//!
//! Incoming frames are interleaved byte pixels (HWC); the graphs consume
//! planar float channels (CHW). Reordering only moves bytes — the affine
//! normalization that follows is a separate step so the same planar buffer
//! can feed models with different value ranges.

use crate::core::errors::{VisionError, VisionResult};
use rayon::prelude::*;

/// Channel order of an interleaved pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// Red, green, blue — the order produced by the `image` crate.
    Rgb,
    /// Blue, green, red — the order produced by most video capture stacks.
    Bgr,
}

/// Reorders an interleaved pixel buffer into planar RGB channels.
///
/// `pixels` holds `width * height` three-byte pixels in `layout` order; the
/// output holds the R plane, then G, then B. Values are copied untouched.
pub fn interleaved_to_planar(
    pixels: &[u8],
    width: usize,
    height: usize,
    layout: ChannelLayout,
    out: &mut Vec<u8>,
) {
    let plane = width * height;
    debug_assert_eq!(pixels.len(), plane * 3);
    out.resize(plane * 3, 0);

    // Source offset of the R, G and B channel within one pixel.
    let channel_map: [usize; 3] = match layout {
        ChannelLayout::Rgb => [0, 1, 2],
        ChannelLayout::Bgr => [2, 1, 0],
    };

    out.par_chunks_mut(plane)
        .enumerate()
        .for_each(|(channel, dst)| {
            let src_channel = channel_map[channel];
            for (i, value) in dst.iter_mut().enumerate() {
                *value = pixels[i * 3 + src_channel];
            }
        });
}

/// Per-channel affine normalization `v * alpha[c] + beta[c]`.
///
/// `alpha = scale / std` and `beta = -mean / std`, which covers the `[0,1]`,
/// `[-1,1]` and mean/std schemes the pipelines use.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    alpha: [f32; 3],
    beta: [f32; 3],
}

impl Normalizer {
    /// Creates a normalizer from scale, per-channel mean and std.
    pub fn new(scale: f32, mean: [f32; 3], std: [f32; 3]) -> VisionResult<Self> {
        if scale <= 0.0 {
            return Err(VisionError::parameter("scale must be greater than 0"));
        }
        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(VisionError::parameter(format!(
                    "standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }
        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Ok(Self { alpha, beta })
    }

    /// Byte pixels to `[0, 1]`.
    pub fn unit() -> Self {
        Self {
            alpha: [1.0 / 255.0; 3],
            beta: [0.0; 3],
        }
    }

    /// Byte pixels to `[-1, 1]`: `(v / 255 - 0.5) / 0.5`.
    pub fn symmetric() -> Self {
        Self {
            alpha: [2.0 / 255.0; 3],
            beta: [-1.0; 3],
        }
    }

    /// ImageNet mean/std normalization over `[0, 1]`-scaled pixels.
    pub fn imagenet() -> Self {
        let mean = [0.485, 0.456, 0.406];
        let std = [0.229, 0.224, 0.225];
        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = (1.0 / 255.0) / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Self { alpha, beta }
    }

    /// Normalizes a planar byte buffer (three equal channel planes) into
    /// `out`, resized to match.
    pub fn apply_planar(&self, planar: &[u8], out: &mut Vec<f32>) {
        debug_assert_eq!(planar.len() % 3, 0);
        let plane = planar.len() / 3;
        out.resize(planar.len(), 0.0);
        out.par_chunks_mut(plane)
            .zip(planar.par_chunks(plane))
            .enumerate()
            .for_each(|(channel, (dst, src))| {
                let alpha = self.alpha[channel];
                let beta = self.beta[channel];
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = s as f32 * alpha + beta;
                }
            });
    }
}
