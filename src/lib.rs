//! # vision-serve
//!
//! The model inference core of a vision serving runtime: object detection
//! (YOLO family) and text recognition (two-stage OCR) over ONNX Runtime
//! sessions, with lazy model loading and concurrent-safe reuse.
//!
//! ## Features
//!
//! - Read-through model cache keyed by logical model name
//! - Version-dispatched box decoding with class-agnostic NMS
//! - Two-stage text pipeline: region proposals then sequence decoding
//! - Reduced-precision (f16) tensor marshaling
//! - Execution-provider selection validated against a capability table
//!
//! ## Modules
//!
//! * [`core`] - errors, configuration and the execution context
//! * [`processors`] - numeric conversion, letterboxing, geometry, normalization
//! * [`models`] - the detector and text pipeline engines
//! * [`pipeline`] - model cache and the request-facing service
//! * [`utils`] - file loading helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vision_serve::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ExecutionContext::new(Framework::OnnxRuntime, ExecutionProvider::Cpu, 0)?;
//! let config = ModelConfig::from_yaml_file(std::path::Path::new("config/models.yaml"))?;
//! let service = VisionService::new(context, config);
//!
//! let image = load_image(std::path::Path::new("frame.png"))?;
//! let frames = service.detect("hd2-yolo11n", &[image], DEFAULT_CONFIDENCE_THRESHOLD)?;
//! for detection in &frames[0].detections {
//!     println!(
//!         "{} {:.1}% at {:?}",
//!         detection.class_name,
//!         detection.confidence * 100.0,
//!         detection.rect
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use vision_serve::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ExecutionContext, ExecutionProvider, Framework, ModelConfig, VisionError, VisionResult,
    };
    pub use crate::models::ocr::{OcrFrame, OcrLine, OcrVersion};
    pub use crate::models::yolo::{Detection, DetectionFrame, YoloVersion};
    pub use crate::pipeline::{DEFAULT_CONFIDENCE_THRESHOLD, VisionService};
    pub use crate::utils::load_image;
}
