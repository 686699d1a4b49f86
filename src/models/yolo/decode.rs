//! Version-specific decoding of detector output tensors.
//!
//! The two supported output layouts are numerically distinct and form a
//! closed set, so decoding is dispatched over a tagged strategy rather than
//! an open trait: anchor-free models emit `[1, 4+classes, detections]` with
//! center-form geometry, fixed-format models emit `[detections, 6]` rows of
//! `(left, top, right, bottom, confidence, class_id)`.

use crate::core::errors::{VisionError, VisionResult};
use crate::processors::geometry::{Rect, nms_indices};
use crate::processors::letterbox::LetterboxMeta;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// IOU threshold applied by the suppression pass after decoding.
pub const NMS_IOU_THRESHOLD: f32 = 0.3;

/// Detector model generation, parsed from the configured version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoloVersion {
    /// Fixed-format output heads.
    V10,
    /// Anchor-free output heads.
    V11,
}

impl std::fmt::Display for YoloVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YoloVersion::V10 => write!(f, "v10"),
            YoloVersion::V11 => write!(f, "v11"),
        }
    }
}

impl FromStr for YoloVersion {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v10" | "yolov10" => Ok(YoloVersion::V10),
            "v11" | "yolov11" => Ok(YoloVersion::V11),
            other => Err(VisionError::parameter(format!(
                "unsupported version: {other}"
            ))),
        }
    }
}

/// Decode strategy selected by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Per-cell class scores plus center-form geometry, no anchors.
    AnchorFree,
    /// Post-NMS-style rows of corner-form boxes with confidence and class.
    FixedFormat,
}

impl DecodeStrategy {
    /// Maps a model version onto its output layout.
    pub fn for_version(version: YoloVersion) -> Self {
        match version {
            YoloVersion::V10 => DecodeStrategy::FixedFormat,
            YoloVersion::V11 => DecodeStrategy::AnchorFree,
        }
    }
}

/// A single detected object in original-image coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// Index into the model's class table.
    pub class_id: usize,
    /// Bounding box in original-image coordinates.
    pub rect: Rect,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Class name shared with the model's class table.
    pub class_name: Arc<str>,
}

/// Geometry linking model-input coordinates back to the original image.
#[derive(Debug, Clone, Copy)]
pub struct DecodeGeometry {
    /// Letterbox metadata from preprocessing.
    pub meta: LetterboxMeta,
    /// Model input size (width, height).
    pub input: (u32, u32),
    /// Original image size (width, height).
    pub original: (u32, u32),
}

/// Decodes raw output tensors into suppressed, rescaled detections.
#[derive(Debug)]
pub struct BoxDecoder {
    strategy: DecodeStrategy,
    class_names: Arc<[Arc<str>]>,
}

impl BoxDecoder {
    /// Creates a decoder for the given version over a shared class table.
    pub fn new(version: YoloVersion, class_names: Arc<[Arc<str>]>) -> Self {
        Self {
            strategy: DecodeStrategy::for_version(version),
            class_names,
        }
    }

    /// The class table this decoder resolves names from.
    pub fn class_names(&self) -> &Arc<[Arc<str>]> {
        &self.class_names
    }

    /// Decodes one output tensor, then applies greedy NMS over the union of
    /// all emitted detections (no class grouping).
    pub fn decode(
        &self,
        output: &[f32],
        shape: &[usize],
        confidence_threshold: f32,
        geometry: &DecodeGeometry,
    ) -> VisionResult<Vec<Detection>> {
        let detections = match self.strategy {
            DecodeStrategy::AnchorFree => {
                self.anchor_free(output, shape, confidence_threshold, geometry)?
            }
            DecodeStrategy::FixedFormat => {
                self.fixed_format(output, confidence_threshold, geometry)
            }
        };

        let boxes: Vec<Rect> = detections.iter().map(|d| d.rect).collect();
        let scores: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        let keep = nms_indices(&boxes, &scores, NMS_IOU_THRESHOLD);
        Ok(keep.into_iter().map(|i| detections[i].clone()).collect())
    }

    /// Anchor-free layout: `[1, 4 + classes, detections]`, channels first.
    ///
    /// For every detection column the best class score is selected; columns
    /// above the threshold are converted from center form to corner form and
    /// projected back onto the original image with clipping.
    fn anchor_free(
        &self,
        output: &[f32],
        shape: &[usize],
        confidence_threshold: f32,
        geometry: &DecodeGeometry,
    ) -> VisionResult<Vec<Detection>> {
        if shape.len() != 3 || shape[1] < 5 {
            return Err(VisionError::parameter(format!(
                "unexpected anchor-free output shape: {shape:?}"
            )));
        }
        let num_features = shape[1];
        let num_detections = shape[2];
        let num_classes = num_features - 4;
        if output.len() < num_features * num_detections {
            return Err(VisionError::parameter(format!(
                "output tensor holds {} values, expected {}",
                output.len(),
                num_features * num_detections
            )));
        }

        let (orig_w, orig_h) = geometry.original;
        let mut detections = Vec::with_capacity(256);
        for d in 0..num_detections {
            let cx = output[d];
            let cy = output[num_detections + d];
            let ow = output[2 * num_detections + d];
            let oh = output[3 * num_detections + d];

            let mut class_id = 0usize;
            let mut confidence = output[4 * num_detections + d];
            for candidate in 1..num_classes {
                let score = output[(4 + candidate) * num_detections + d];
                if score > confidence {
                    confidence = score;
                    class_id = candidate;
                }
            }

            if confidence > confidence_threshold {
                let scaled = Rect::new(cx - ow * 0.5, cy - oh * 0.5, ow, oh);
                let rect = geometry.meta.restore_rect(scaled, orig_w, orig_h, true);
                let Some(class_name) = self.class_names.get(class_id) else {
                    tracing::debug!("skipping detection with out-of-table class {class_id}");
                    continue;
                };
                detections.push(Detection {
                    class_id,
                    rect,
                    confidence,
                    class_name: class_name.clone(),
                });
            }
        }
        Ok(detections)
    }

    /// Fixed-format layout: rows of `(l, t, r, b, confidence, class_id)`.
    ///
    /// Padding is removed and coordinates rescaled by the per-axis ratio
    /// between model-input and original size, truncating to whole pixels.
    fn fixed_format(
        &self,
        output: &[f32],
        confidence_threshold: f32,
        geometry: &DecodeGeometry,
    ) -> Vec<Detection> {
        let num_detections = output.len() / 6;
        let (input_w, input_h) = geometry.input;
        let (orig_w, orig_h) = geometry.original;

        let width_scale = input_w as f32 / orig_w as f32;
        let height_scale = input_h as f32 / orig_h as f32;
        let new_width = (orig_w as f32 * width_scale) as i32;
        let new_height = (orig_h as f32 * height_scale) as i32;
        let pad_x = ((input_w as i32 - new_width) / 2) as f32;
        let pad_y = ((input_h as i32 - new_height) / 2) as f32;

        let mut detections = Vec::with_capacity(256);
        for row in output.chunks_exact(6).take(num_detections) {
            let confidence = row[4];
            if confidence < confidence_threshold {
                continue;
            }
            let left = (row[0] - pad_x) / width_scale;
            let top = (row[1] - pad_y) / height_scale;
            let right = (row[2] - pad_x) / width_scale;
            let bottom = (row[3] - pad_y) / height_scale;
            let class_id = row[5] as i32;
            if class_id < 0 {
                continue;
            }
            let class_id = class_id as usize;
            let Some(class_name) = self.class_names.get(class_id) else {
                tracing::debug!("skipping detection with out-of-table class {class_id}");
                continue;
            };
            detections.push(Detection {
                class_id,
                rect: Rect::new(
                    left as i32 as f32,
                    top as i32 as f32,
                    (right - left) as i32 as f32,
                    (bottom - top) as i32 as f32,
                ),
                confidence,
                class_name: class_name.clone(),
            });
        }
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_table(n: usize) -> Arc<[Arc<str>]> {
        (0..n)
            .map(|i| Arc::from(format!("class{i}").as_str()))
            .collect()
    }

    fn identity_geometry(size: u32) -> DecodeGeometry {
        DecodeGeometry {
            meta: LetterboxMeta {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
            },
            input: (size, size),
            original: (size, size),
        }
    }

    #[test]
    fn version_tags_parse() {
        assert_eq!("v10".parse::<YoloVersion>().unwrap(), YoloVersion::V10);
        assert_eq!("V11".parse::<YoloVersion>().unwrap(), YoloVersion::V11);
        assert!("v8".parse::<YoloVersion>().is_err());
    }

    #[test]
    fn fixed_format_filters_and_rescales() {
        // Two rows at equal image/model size: only the first clears the
        // threshold and comes back in corner-to-size form.
        let decoder = BoxDecoder::new(YoloVersion::V10, class_table(4));
        let output = [
            10.0, 10.0, 50.0, 50.0, 0.9, 3.0, //
            12.0, 12.0, 48.0, 48.0, 0.2, 3.0,
        ];
        let detections = decoder
            .decode(&output, &[2, 6], 0.5, &identity_geometry(100))
            .unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 3);
        assert_eq!(det.confidence, 0.9);
        assert_eq!(det.rect, Rect::new(10.0, 10.0, 40.0, 40.0));
        assert_eq!(det.class_name.as_ref(), "class3");
    }

    #[test]
    fn anchor_free_picks_best_class() {
        // One detection column, layout [1, 4+2, 1]: center (50,50), 20x10,
        // class scores 0.3 / 0.8.
        let decoder = BoxDecoder::new(YoloVersion::V11, class_table(2));
        let output = [50.0, 50.0, 20.0, 10.0, 0.3, 0.8];
        let detections = decoder
            .decode(&output, &[1, 6, 1], 0.5, &identity_geometry(100))
            .unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 1);
        assert_eq!(det.confidence, 0.8);
        assert_eq!(det.rect, Rect::new(40.0, 45.0, 20.0, 10.0));
    }

    #[test]
    fn anchor_free_threshold_is_strict() {
        let decoder = BoxDecoder::new(YoloVersion::V11, class_table(1));
        let output = [50.0, 50.0, 20.0, 10.0, 0.5];
        let detections = decoder
            .decode(&output, &[1, 5, 1], 0.5, &identity_geometry(100))
            .unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn overlapping_detections_are_suppressed() {
        // Two near-identical fixed-format rows above threshold: NMS keeps
        // the higher-confidence one regardless of class.
        let decoder = BoxDecoder::new(YoloVersion::V10, class_table(4));
        let output = [
            10.0, 10.0, 50.0, 50.0, 0.7, 1.0, //
            11.0, 11.0, 51.0, 51.0, 0.9, 2.0,
        ];
        let detections = decoder
            .decode(&output, &[2, 6], 0.5, &identity_geometry(100))
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 2);
    }

    #[test]
    fn anchor_free_rejects_malformed_shape() {
        let decoder = BoxDecoder::new(YoloVersion::V11, class_table(1));
        let err = decoder
            .decode(&[0.0; 6], &[6], 0.5, &identity_geometry(100))
            .unwrap_err();
        assert!(matches!(err, VisionError::Parameter { .. }));
    }
}
