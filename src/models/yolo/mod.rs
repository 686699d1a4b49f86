//! Object detection engine.
//!
//! A loaded detector owns a fixed input shape read from the graph, a decode
//! strategy selected by version tag, and a small pool of inference states.
//! Each state bundles a session with the scratch buffers `run` mutates in
//! place; states are picked round-robin and locked for the duration of a
//! call, so concurrent `run` invocations never share mutable scratch state.

pub mod decode;

pub use decode::{BoxDecoder, DecodeGeometry, DecodeStrategy, Detection, YoloVersion};

use crate::core::context::ExecutionContext;
use crate::core::errors::{VisionError, VisionResult};
use crate::models::{ensure_float_type, primary_input, primary_output};
use crate::processors::convert::{f16_to_f32, f32_to_f16};
use crate::processors::letterbox::letterbox;
use crate::processors::normalization::{ChannelLayout, Normalizer, interleaved_to_planar};
use half::f16;
use image::{Rgb, RgbImage};
use once_cell::sync::Lazy;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::TensorRef;
use regex::Regex;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Detections for one submitted image, in suppression order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DetectionFrame {
    /// Surviving detections in original-image coordinates.
    pub detections: Vec<Detection>,
}

/// Quoted entries inside the exported `names` metadata map.
static CLASS_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([^']+)'").unwrap_or_else(|e| panic!("invalid pattern: {e}")));

struct YoloState {
    session: Session,
    planar: Vec<u8>,
    input_f32: Vec<f32>,
    input_f16: Vec<f16>,
    output_f32: Vec<f32>,
}

/// A loaded detector bound to an execution provider.
pub struct YoloEngine {
    version: YoloVersion,
    decoder: BoxDecoder,
    class_names: Arc<[Arc<str>]>,
    input_name: String,
    output_name: String,
    input_width: u32,
    input_height: u32,
    input_type: TensorElementType,
    output_type: TensorElementType,
    states: Vec<Mutex<YoloState>>,
    next_state: AtomicUsize,
}

impl std::fmt::Debug for YoloEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloEngine")
            .field("version", &self.version)
            .field("classes", &self.class_names.len())
            .field("input", &(self.input_width, self.input_height))
            .field("states", &self.states.len())
            .finish()
    }
}

impl YoloEngine {
    /// Loads a detector from serialized graph bytes.
    ///
    /// Reads the fixed input shape, the input/output element types and the
    /// class table from the graph; `pool_size` sessions are built so that
    /// many callers can run concurrently without sharing scratch tensors.
    pub fn from_bytes(
        context: &ExecutionContext,
        bytes: &[u8],
        version: YoloVersion,
        pool_size: usize,
    ) -> VisionResult<Self> {
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(context.create_session(bytes)?);
        }

        let (input_name, input_type, input_shape) = primary_input(&sessions[0])?;
        let (output_name, output_type) = primary_output(&sessions[0])?;
        ensure_float_type("input", input_type)?;
        ensure_float_type("output", output_type)?;

        if input_shape.len() != 4 {
            return Err(VisionError::model(format!(
                "expected 4 input dimensions, got shape {input_shape:?}"
            )));
        }
        let input_height = input_shape[2];
        let input_width = input_shape[3];
        if input_height <= 0 || input_width <= 0 {
            return Err(VisionError::model(format!(
                "dynamic input shape {input_shape:?} is not supported by the detector"
            )));
        }

        let class_names = read_class_names(&sessions[0])?;
        debug!(
            classes = class_names.len(),
            input_width, input_height, "loaded detector {version}"
        );

        let states = sessions
            .into_iter()
            .map(|session| {
                Mutex::new(YoloState {
                    session,
                    planar: Vec::new(),
                    input_f32: Vec::new(),
                    input_f16: Vec::new(),
                    output_f32: Vec::new(),
                })
            })
            .collect();

        Ok(Self {
            version,
            decoder: BoxDecoder::new(version, class_names.clone()),
            class_names,
            input_name,
            output_name,
            input_width: input_width as u32,
            input_height: input_height as u32,
            input_type,
            output_type,
            states,
            next_state: AtomicUsize::new(0),
        })
    }

    /// The parsed version tag this engine decodes with.
    pub fn version(&self) -> YoloVersion {
        self.version
    }

    /// Class table read from the model metadata.
    pub fn class_names(&self) -> &Arc<[Arc<str>]> {
        &self.class_names
    }

    /// Runs one image through the detector.
    ///
    /// Preprocess (letterbox, planar RGB, `[0,1]`), execute in the session's
    /// native precision, decode by version, suppress overlaps and rescale
    /// into original-image coordinates.
    pub fn run(&self, image: &RgbImage, confidence_threshold: f32) -> VisionResult<DetectionFrame> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::parameter("image is empty"));
        }

        let (canvas, meta) = letterbox(image, self.input_width, self.input_height, Rgb([0, 0, 0]));
        let geometry = DecodeGeometry {
            meta,
            input: (self.input_width, self.input_height),
            original: image.dimensions(),
        };
        let height = self.input_height as usize;
        let width = self.input_width as usize;

        let idx = self.next_state.fetch_add(1, Ordering::Relaxed) % self.states.len();
        let mut guard = self.states[idx]
            .lock()
            .map_err(|_| VisionError::runtime("detector inference state lock poisoned"))?;
        let state = &mut *guard;

        interleaved_to_planar(
            canvas.as_raw(),
            width,
            height,
            ChannelLayout::Rgb,
            &mut state.planar,
        );
        Normalizer::unit().apply_planar(&state.planar, &mut state.input_f32);

        let outputs = match self.input_type {
            TensorElementType::Float32 => {
                let view =
                    ndarray::ArrayView4::from_shape((1, 3, height, width), &state.input_f32)?;
                let tensor = TensorRef::from_array_view(view)?;
                state
                    .session
                    .run(ort::inputs![self.input_name.as_str() => tensor])?
            }
            TensorElementType::Float16 => {
                state.input_f16.resize(state.input_f32.len(), f16::ZERO);
                f32_to_f16(&state.input_f32, &mut state.input_f16);
                let view =
                    ndarray::ArrayView4::from_shape((1, 3, height, width), &state.input_f16)?;
                let tensor = TensorRef::from_array_view(view)?;
                state
                    .session
                    .run(ort::inputs![self.input_name.as_str() => tensor])?
            }
            other => {
                return Err(VisionError::parameter(format!(
                    "unsupported input value type: {other:?}"
                )));
            }
        };

        let detections = match self.output_type {
            TensorElementType::Float32 => {
                let (shape, data) =
                    outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
                let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
                self.decoder
                    .decode(data, &dims, confidence_threshold, &geometry)?
            }
            TensorElementType::Float16 => {
                let (shape, data) =
                    outputs[self.output_name.as_str()].try_extract_tensor::<f16>()?;
                let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
                state.output_f32.resize(data.len(), 0.0);
                f16_to_f32(data, &mut state.output_f32);
                self.decoder
                    .decode(&state.output_f32, &dims, confidence_threshold, &geometry)?
            }
            other => {
                return Err(VisionError::parameter(format!(
                    "unsupported output value type: {other:?}"
                )));
            }
        };

        Ok(DetectionFrame { detections })
    }
}

/// Extracts the class table from the exported `names` metadata entry.
fn read_class_names(session: &Session) -> VisionResult<Arc<[Arc<str>]>> {
    let metadata = session.metadata()?;
    let raw = metadata
        .custom("names")?
        .ok_or_else(|| VisionError::model("unable to find class names from model metadata"))?;
    let names: Arc<[Arc<str>]> = CLASS_NAME_PATTERN
        .captures_iter(&raw)
        .map(|capture| Arc::from(&capture[1]))
        .collect();
    Ok(names)
}
