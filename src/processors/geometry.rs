//! Geometric primitives shared by the detection pipelines.
//!
//! Boxes are axis-aligned rectangles in whatever coordinate space the caller
//! is working in (model-input or original-image). The module also hosts the
//! two overlap filters the pipelines rely on: greedy confidence-ranked
//! non-max suppression for detector outputs and greedy IOU deduplication for
//! text region proposals.

use serde::Serialize;

/// An axis-aligned rectangle: origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    /// X coordinate of the left edge.
    pub x: f32,
    /// Y coordinate of the top edge.
    pub y: f32,
    /// Width of the rectangle.
    pub width: f32,
    /// Height of the rectangle.
    pub height: f32,
}

impl Rect {
    /// Creates a rectangle from origin and size.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from corner coordinates.
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Rectangle area; degenerate rectangles have zero area.
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union with another rectangle.
    ///
    /// Returns 0 when the union is degenerate.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter_left = self.x.max(other.x);
        let inter_top = self.y.max(other.y);
        let inter_right = self.right().min(other.right());
        let inter_bottom = self.bottom().min(other.bottom());
        let inter = (inter_right - inter_left).max(0.0) * (inter_bottom - inter_top).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }
}

/// Greedy non-max suppression over a set of scored boxes.
///
/// Boxes are ranked by descending score with no class grouping; the
/// highest-scoring box is kept and every remaining box whose IOU with a kept
/// box exceeds `iou_threshold` is discarded. Returns indices into the input,
/// in score order.
pub fn nms_indices(boxes: &[Rect], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len());
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for &i in &order {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order {
            if j != i && !suppressed[j] && boxes[i].iou(&boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Greedy IOU deduplication used on text region proposals.
///
/// Walks the boxes in input order and keeps a box only if its IOU with every
/// already-kept box stays at or below `iou_threshold`.
pub fn filter_by_iou(boxes: &[Rect], iou_threshold: f32) -> Vec<Rect> {
    let mut kept: Vec<Rect> = Vec::new();
    for rect in boxes {
        if kept.iter().all(|k| rect.iou(k) <= iou_threshold) {
            kept.push(*rect);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = Rect::new(10.0, 10.0, 40.0, 40.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn nms_keeps_higher_confidence_of_overlapping_pair() {
        let boxes = [
            Rect::new(10.0, 10.0, 40.0, 40.0),
            Rect::new(12.0, 12.0, 36.0, 36.0),
        ];
        let scores = [0.2, 0.9];
        assert!(boxes[0].iou(&boxes[1]) > 0.3);
        let keep = nms_indices(&boxes, &scores, 0.3);
        assert_eq!(keep, vec![1]);
    }

    #[test]
    fn nms_keeps_both_when_overlap_below_threshold() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(100.0, 100.0, 10.0, 10.0),
        ];
        let scores = [0.9, 0.8];
        let keep = nms_indices(&boxes, &scores, 0.3);
        assert_eq!(keep.len(), 2);
    }

    #[test]
    fn nms_is_idempotent() {
        let boxes = [
            Rect::new(10.0, 10.0, 40.0, 40.0),
            Rect::new(12.0, 12.0, 36.0, 36.0),
            Rect::new(200.0, 200.0, 30.0, 30.0),
            Rect::new(205.0, 205.0, 30.0, 30.0),
        ];
        let scores = [0.9, 0.8, 0.7, 0.95];
        let keep = nms_indices(&boxes, &scores, 0.3);

        let surviving: Vec<Rect> = keep.iter().map(|&i| boxes[i]).collect();
        let surviving_scores: Vec<f32> = keep.iter().map(|&i| scores[i]).collect();
        let again = nms_indices(&surviving, &surviving_scores, 0.3);
        assert_eq!(again.len(), surviving.len());
    }

    #[test]
    fn dedup_keeps_first_of_overlapping_pair() {
        let boxes = [
            Rect::new(0.0, 0.0, 32.0, 32.0),
            Rect::new(2.0, 2.0, 32.0, 32.0),
            Rect::new(300.0, 0.0, 32.0, 32.0),
        ];
        let kept = filter_by_iou(&boxes, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], boxes[0]);
        assert_eq!(kept[1], boxes[2]);
    }
}
