//! Text region proposals from the detection probability map.
//!
//! The detection graph emits a single-channel probability map in model-input
//! resolution. Proposals are formed by binarizing the map with a direct cast
//! to 8-bit, dilating to merge nearby strokes into connected regions,
//! extracting contours, fitting axis-aligned rectangles and deduplicating
//! overlapping candidates by IOU.

use crate::processors::geometry::{Rect, filter_by_iou};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use itertools::Itertools;

/// Extracts region-proposal rectangles from a probability map.
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    /// Radius of the square dilation structuring element.
    pub kernel_radius: u8,
    /// Total dilation passes applied to the binarized map.
    pub dilation_passes: usize,
    /// Minimum contour area (map pixels) for a proposal to survive.
    pub min_contour_area: f64,
    /// Minimum bounding-rectangle area for a proposal to survive.
    pub min_rect_area: f32,
    /// IOU threshold for greedy deduplication of surviving rectangles.
    pub dedup_iou: f32,
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self {
            kernel_radius: 3,
            dilation_passes: 3,
            min_contour_area: 12.0 * 12.0,
            min_rect_area: 8.0 * 8.0,
            dedup_iou: 0.3,
        }
    }
}

impl RegionExtractor {
    /// Runs the full proposal pass over a `width` x `height` probability map.
    ///
    /// Returned rectangles are in map (detector-input) coordinates, ordered
    /// by contour discovery with overlapping duplicates removed.
    pub fn extract(&self, probability_map: &[f32], width: u32, height: u32) -> Vec<Rect> {
        debug_assert_eq!(probability_map.len(), (width * height) as usize);

        let mut binary = GrayImage::new(width, height);
        for (value, pixel) in probability_map.iter().zip(binary.pixels_mut()) {
            // Direct type cast: only saturated probabilities survive.
            *pixel = Luma([if *value as u8 > 0 { 255 } else { 0 }]);
        }

        let mut dilated = binary;
        for _ in 0..self.dilation_passes {
            dilated = dilate(&dilated, Norm::LInf, self.kernel_radius);
        }

        let mut rects = Vec::new();
        for contour in find_contours::<u32>(&dilated) {
            if polygon_area(&contour.points) <= self.min_contour_area {
                continue;
            }
            let Some(rect) = bounding_rect(&contour.points) else {
                continue;
            };
            if rect.area() > self.min_rect_area {
                rects.push(rect);
            }
        }

        filter_by_iou(&rects, self.dedup_iou)
    }
}

/// Shoelace area of a closed contour.
fn polygon_area(points: &[imageproc::point::Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0.0f64;
    for (a, b) in points.iter().circular_tuple_windows() {
        doubled += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    doubled.abs() / 2.0
}

/// Axis-aligned bounding rectangle of a contour.
fn bounding_rect(points: &[imageproc::point::Point<u32>]) -> Option<Rect> {
    let (min_x, max_x) = points.iter().map(|p| p.x).minmax().into_option()?;
    let (min_y, max_y) = points.iter().map(|p| p.y).minmax().into_option()?;
    Some(Rect::new(
        min_x as f32,
        min_y as f32,
        (max_x - min_x + 1) as f32,
        (max_y - min_y + 1) as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_block(
        width: u32,
        height: u32,
        x0: u32,
        y0: u32,
        side: u32,
        value: f32,
    ) -> Vec<f32> {
        let mut map = vec![0.0f32; (width * height) as usize];
        for y in y0..(y0 + side) {
            for x in x0..(x0 + side) {
                map[(y * width + x) as usize] = value;
            }
        }
        map
    }

    #[test]
    fn saturated_block_becomes_one_region() {
        let map = map_with_block(96, 96, 20, 20, 24, 1.0);
        let rects = RegionExtractor::default().extract(&map, 96, 96);
        assert_eq!(rects.len(), 1);
        let rect = rects[0];
        // Dilation grows the block outward but the region must still cover it.
        assert!(rect.x <= 20.0 && rect.y <= 20.0);
        assert!(rect.right() >= 44.0 && rect.bottom() >= 44.0);
    }

    #[test]
    fn sub_unit_probabilities_cast_to_zero() {
        let map = map_with_block(96, 96, 20, 20, 24, 0.9);
        let rects = RegionExtractor::default().extract(&map, 96, 96);
        assert!(rects.is_empty());
    }

    #[test]
    fn distant_blocks_stay_separate() {
        let mut map = map_with_block(160, 64, 8, 8, 20, 1.0);
        let second = map_with_block(160, 64, 120, 8, 20, 1.0);
        for (dst, src) in map.iter_mut().zip(&second) {
            *dst = dst.max(*src);
        }
        let rects = RegionExtractor::default().extract(&map, 160, 64);
        assert_eq!(rects.len(), 2);
    }

    #[test]
    fn empty_map_yields_no_regions() {
        let map = vec![0.0f32; 64 * 64];
        let rects = RegionExtractor::default().extract(&map, 64, 64);
        assert!(rects.is_empty());
    }
}
