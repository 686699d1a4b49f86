//! Two-stage text recognition engine.
//!
//! One engine composes a text detection session and a text recognition
//! session sharing the crate's image utilities. The detection stage turns a
//! probability map into region proposals; the recognition stage crops every
//! surviving region from the original image and decodes its character
//! sequence. Like the detector, the engine keeps a pool of mutex-guarded
//! inference states so concurrent `run` calls never share scratch buffers.

pub mod decode;
pub mod regions;

pub use decode::SequenceDecoder;
pub use regions::RegionExtractor;

use crate::core::context::ExecutionContext;
use crate::core::errors::{VisionError, VisionResult};
use crate::models::{ensure_f32_type, primary_input, primary_output};
use crate::processors::geometry::Rect;
use crate::processors::letterbox::{letterbox, pad_to_multiple};
use crate::processors::normalization::{ChannelLayout, Normalizer, interleaved_to_planar};
use image::{Rgb, RgbImage, imageops};
use ort::session::Session;
use ort::value::TensorRef;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Detection inputs must be padded to a multiple of the graph stride.
const DETECTION_STRIDE: u32 = 32;
/// Fixed height recognition crops are resized to; widths pad to a multiple
/// of the same value.
const RECOGNITION_HEIGHT: u32 = 48;

/// Text pipeline generation, parsed from the configured version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrVersion {
    /// PP-OCR v4 style detection/recognition pair.
    PaddleV4,
    /// PP-OCR v5 style detection/recognition pair.
    PaddleV5,
}

impl std::fmt::Display for OcrVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrVersion::PaddleV4 => write!(f, "ppocr-v4"),
            OcrVersion::PaddleV5 => write!(f, "ppocr-v5"),
        }
    }
}

impl FromStr for OcrVersion {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ppocr-v4" | "ppocrv4" | "v4" => Ok(OcrVersion::PaddleV4),
            "ppocr-v5" | "ppocrv5" | "v5" => Ok(OcrVersion::PaddleV5),
            other => Err(VisionError::parameter(format!(
                "unsupported version: {other}"
            ))),
        }
    }
}

/// One recognized text region in original-image coordinates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OcrLine {
    /// Region box in original-image coordinates.
    pub rect: Rect,
    /// Decoded text; may be empty when no character passed the threshold.
    pub text: String,
    /// Mean probability of the accepted characters, 0 when none passed.
    pub confidence: f32,
}

/// Recognized lines for one submitted image.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OcrFrame {
    /// One entry per surviving region proposal.
    pub lines: Vec<OcrLine>,
}

struct OcrState {
    det: Session,
    rec: Session,
    planar: Vec<u8>,
    det_input: Vec<f32>,
    rec_input: Vec<f32>,
}

/// A loaded two-stage text pipeline.
pub struct OcrEngine {
    version: OcrVersion,
    decoder: SequenceDecoder,
    regions: RegionExtractor,
    det_input_name: String,
    det_output_name: String,
    rec_input_name: String,
    rec_output_name: String,
    states: Vec<Mutex<OcrState>>,
    next_state: AtomicUsize,
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("version", &self.version)
            .field("characters", &self.decoder.character_count())
            .field("states", &self.states.len())
            .finish()
    }
}

impl OcrEngine {
    /// Loads a text pipeline from its two serialized graphs and character
    /// dictionary entries.
    pub fn from_bytes(
        context: &ExecutionContext,
        det_bytes: &[u8],
        rec_bytes: &[u8],
        characters: Vec<String>,
        version: OcrVersion,
        pool_size: usize,
    ) -> VisionResult<Self> {
        let pool_size = pool_size.max(1);
        let mut states = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            states.push(Mutex::new(OcrState {
                det: context.create_session(det_bytes)?,
                rec: context.create_session(rec_bytes)?,
                planar: Vec::new(),
                det_input: Vec::new(),
                rec_input: Vec::new(),
            }));
        }

        let (det_input_name, det_output_name, rec_input_name, rec_output_name) = {
            let first = states[0]
                .lock()
                .map_err(|_| VisionError::runtime("ocr inference state lock poisoned"))?;
            let (det_input_name, det_input_type, _) = primary_input(&first.det)?;
            let (det_output_name, det_output_type) = primary_output(&first.det)?;
            let (rec_input_name, rec_input_type, _) = primary_input(&first.rec)?;
            let (rec_output_name, rec_output_type) = primary_output(&first.rec)?;
            ensure_f32_type("detection input", det_input_type)?;
            ensure_f32_type("detection output", det_output_type)?;
            ensure_f32_type("recognition input", rec_input_type)?;
            ensure_f32_type("recognition output", rec_output_type)?;
            (
                det_input_name,
                det_output_name,
                rec_input_name,
                rec_output_name,
            )
        };

        debug!(
            characters = characters.len(),
            states = pool_size,
            "loaded text pipeline {version}"
        );

        Ok(Self {
            version,
            decoder: SequenceDecoder::new(characters),
            regions: RegionExtractor::default(),
            det_input_name,
            det_output_name,
            rec_input_name,
            rec_output_name,
            states,
            next_state: AtomicUsize::new(0),
        })
    }

    /// The parsed version tag of this pipeline.
    pub fn version(&self) -> OcrVersion {
        self.version
    }

    /// Number of dictionary characters (excluding the blank class).
    pub fn character_count(&self) -> usize {
        self.decoder.character_count()
    }

    /// Runs both stages over one image.
    pub fn run(&self, image: &RgbImage, confidence_threshold: f32) -> VisionResult<OcrFrame> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::parameter("image is empty"));
        }

        let idx = self.next_state.fetch_add(1, Ordering::Relaxed) % self.states.len();
        let mut guard = self.states[idx]
            .lock()
            .map_err(|_| VisionError::runtime("ocr inference state lock poisoned"))?;
        let state = &mut *guard;

        let rects = Self::detect_regions(
            &self.regions,
            &self.det_input_name,
            &self.det_output_name,
            state,
            image,
        )?;

        let mut lines = Vec::with_capacity(rects.len());
        for rect in rects {
            let Some(crop) = crop_region(image, rect) else {
                debug!("skipping degenerate region {rect:?}");
                continue;
            };
            let (text, confidence) = Self::recognize_region(
                &self.decoder,
                &self.rec_input_name,
                &self.rec_output_name,
                state,
                &crop,
                confidence_threshold,
            )?;
            lines.push(OcrLine {
                rect,
                text,
                confidence,
            });
        }

        Ok(OcrFrame { lines })
    }

    /// Detection stage: probability map to region boxes in original-image
    /// coordinates.
    fn detect_regions(
        regions: &RegionExtractor,
        input_name: &str,
        output_name: &str,
        state: &mut OcrState,
        image: &RgbImage,
    ) -> VisionResult<Vec<Rect>> {
        let padded_width = pad_to_multiple(image.width(), DETECTION_STRIDE);
        let padded_height = pad_to_multiple(image.height(), DETECTION_STRIDE);
        let (canvas, meta) = letterbox(image, padded_width, padded_height, Rgb([0, 0, 0]));

        interleaved_to_planar(
            canvas.as_raw(),
            padded_width as usize,
            padded_height as usize,
            ChannelLayout::Rgb,
            &mut state.planar,
        );
        Normalizer::imagenet().apply_planar(&state.planar, &mut state.det_input);

        let view = ndarray::ArrayView4::from_shape(
            (1, 3, padded_height as usize, padded_width as usize),
            &state.det_input,
        )?;
        let tensor = TensorRef::from_array_view(view)?;
        let outputs = state.det.run(ort::inputs![input_name => tensor])?;

        let (shape, data) = outputs[output_name].try_extract_tensor::<f32>()?;
        if shape.len() != 4 {
            return Err(VisionError::parameter(format!(
                "unexpected detection output shape: {shape:?}"
            )));
        }
        let map_height = shape[2].max(0) as u32;
        let map_width = shape[3].max(0) as u32;
        let plane = (map_height * map_width) as usize;
        if data.len() < plane {
            return Err(VisionError::parameter(format!(
                "detection output holds {} values, expected at least {plane}",
                data.len()
            )));
        }

        let proposals = regions.extract(&data[..plane], map_width, map_height);
        Ok(proposals
            .into_iter()
            .map(|r| meta.restore_rect(r, image.width(), image.height(), true))
            .collect())
    }

    /// Recognition stage for one cropped region.
    fn recognize_region(
        decoder: &SequenceDecoder,
        input_name: &str,
        output_name: &str,
        state: &mut OcrState,
        crop: &RgbImage,
        confidence_threshold: f32,
    ) -> VisionResult<(String, f32)> {
        let scale = RECOGNITION_HEIGHT as f32 / crop.height() as f32;
        let target_width = ((crop.width() as f32 * scale) as u32).max(1);
        let padded_width = pad_to_multiple(target_width, RECOGNITION_HEIGHT);

        let resized = imageops::resize(
            crop,
            target_width,
            RECOGNITION_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let mut canvas =
            RgbImage::from_pixel(padded_width, RECOGNITION_HEIGHT, Rgb([0, 0, 0]));
        imageops::replace(&mut canvas, &resized, 0, 0);

        interleaved_to_planar(
            canvas.as_raw(),
            padded_width as usize,
            RECOGNITION_HEIGHT as usize,
            ChannelLayout::Rgb,
            &mut state.planar,
        );
        Normalizer::symmetric().apply_planar(&state.planar, &mut state.rec_input);

        let view = ndarray::ArrayView4::from_shape(
            (1, 3, RECOGNITION_HEIGHT as usize, padded_width as usize),
            &state.rec_input,
        )?;
        let tensor = TensorRef::from_array_view(view)?;
        let outputs = state.rec.run(ort::inputs![input_name => tensor])?;

        let (shape, data) = outputs[output_name].try_extract_tensor::<f32>()?;
        if shape.len() != 3 {
            return Err(VisionError::parameter(format!(
                "unexpected recognition output shape: {shape:?}"
            )));
        }
        let timesteps = shape[1].max(0) as usize;
        let classes = shape[2].max(0) as usize;
        Ok(decoder.decode(data, timesteps, classes, confidence_threshold))
    }
}

/// Crops a region box out of the original image, clamped to its bounds.
///
/// Returns `None` for regions that degenerate to zero pixels after clamping.
fn crop_region(image: &RgbImage, rect: Rect) -> Option<RgbImage> {
    let x = rect.x.max(0.0) as u32;
    let y = rect.y.max(0.0) as u32;
    if x >= image.width() || y >= image.height() {
        return None;
    }
    let width = (rect.width.max(0.0) as u32).min(image.width() - x);
    let height = (rect.height.max(0.0) as u32).min(image.height() - y);
    if width == 0 || height == 0 {
        return None;
    }
    Some(imageops::crop_imm(image, x, y, width, height).to_image())
}
