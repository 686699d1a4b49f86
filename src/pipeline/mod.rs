//! Request-facing inference service.
//!
//! [`VisionService`] is what the transport layer talks to: it owns the
//! execution context, the configuration snapshot and one model cache per
//! engine kind, and maps `{model name, images}` requests onto ordered frame
//! results. Load-time failures abort the whole request; a failure while
//! running a single image drops that image's result from the output, which
//! mirrors the serving behavior this core was extracted from.

pub mod cache;

pub use cache::ModelCache;

use crate::core::config::ModelConfig;
use crate::core::context::ExecutionContext;
use crate::core::errors::{VisionError, VisionResult};
use crate::models::ocr::{OcrEngine, OcrFrame, OcrVersion};
use crate::models::yolo::{DetectionFrame, YoloEngine, YoloVersion};
use crate::utils::{read_character_dict, read_model_bytes};
use image::RgbImage;
use std::sync::Arc;
use tracing::{info, warn};

/// Confidence threshold applied by transports that do not surface one.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.125;

/// Names of every servable model, by kind.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelList {
    /// Configured detector names.
    pub detector: Vec<String>,
    /// Configured text pipeline names.
    pub ocr: Vec<String>,
}

/// The inference core behind the network transport.
#[derive(Debug)]
pub struct VisionService {
    context: ExecutionContext,
    config: ModelConfig,
    session_pool_size: usize,
    detectors: ModelCache<YoloEngine>,
    ocr_models: ModelCache<OcrEngine>,
}

impl VisionService {
    /// Creates a service over a shared context and configuration snapshot.
    pub fn new(context: ExecutionContext, config: ModelConfig) -> Self {
        Self::with_session_pool(context, config, 1)
    }

    /// Creates a service whose engines keep `session_pool_size` inference
    /// states each, allowing that many concurrent `run` calls per model.
    pub fn with_session_pool(
        context: ExecutionContext,
        config: ModelConfig,
        session_pool_size: usize,
    ) -> Self {
        Self {
            context,
            config,
            session_pool_size: session_pool_size.max(1),
            detectors: ModelCache::new(),
            ocr_models: ModelCache::new(),
        }
    }

    /// The execution context shared by every loaded model.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Lists the configured model names by kind.
    pub fn model_names(&self) -> ModelList {
        ModelList {
            detector: self
                .config
                .detector
                .iter()
                .map(|info| info.name.clone())
                .collect(),
            ocr: self.config.ocr.iter().map(|info| info.name.clone()).collect(),
        }
    }

    /// Resolves a detector by name, loading it on first use.
    pub fn detector(&self, name: &str) -> VisionResult<Arc<YoloEngine>> {
        self.detectors.get_or_load(name, || {
            let info = self
                .config
                .find_detector(name)
                .ok_or_else(|| VisionError::model(format!("unable to find model: {name}")))?;
            let version: YoloVersion = info
                .version
                .parse()
                .map_err(|_| VisionError::model(format!("unknown version: {}", info.version)))?;
            let bytes = read_model_bytes(&info.path)?;
            info!(model = name, %version, "loading detector");
            YoloEngine::from_bytes(&self.context, &bytes, version, self.session_pool_size)
                .map_err(|e| {
                    VisionError::model(format!("unable to create detector model {name}: {e}"))
                })
        })
    }

    /// Resolves a text pipeline by name, loading it on first use.
    pub fn ocr(&self, name: &str) -> VisionResult<Arc<OcrEngine>> {
        self.ocr_models.get_or_load(name, || {
            let info = self
                .config
                .find_ocr(name)
                .ok_or_else(|| VisionError::model(format!("unable to find model: {name}")))?;
            let version: OcrVersion = info
                .version
                .parse()
                .map_err(|_| VisionError::model(format!("unknown version: {}", info.version)))?;
            let characters = read_character_dict(&info.char_dict_path)?;
            let det_bytes = read_model_bytes(&info.det_path)?;
            let rec_bytes = read_model_bytes(&info.rec_path)?;
            info!(model = name, %version, "loading text pipeline");
            OcrEngine::from_bytes(
                &self.context,
                &det_bytes,
                &rec_bytes,
                characters,
                version,
                self.session_pool_size,
            )
            .map_err(|e| VisionError::model(format!("unable to create ocr model {name}: {e}")))
        })
    }

    /// Runs a detector over a batch of images.
    ///
    /// Results preserve input order; an image whose run fails is dropped
    /// from the output rather than failing the request.
    pub fn detect(
        &self,
        name: &str,
        images: &[RgbImage],
        confidence_threshold: f32,
    ) -> VisionResult<Vec<DetectionFrame>> {
        let engine = self.detector(name)?;
        let mut frames = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            match engine.run(image, confidence_threshold) {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    warn!(model = name, index, %error, "dropping image from detector response");
                }
            }
        }
        Ok(frames)
    }

    /// Runs a text pipeline over a batch of images.
    ///
    /// Same contract as [`VisionService::detect`].
    pub fn recognize(
        &self,
        name: &str,
        images: &[RgbImage],
        confidence_threshold: f32,
    ) -> VisionResult<Vec<OcrFrame>> {
        let engine = self.ocr(name)?;
        let mut frames = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            match engine.run(image, confidence_threshold) {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    warn!(model = name, index, %error, "dropping image from ocr response");
                }
            }
        }
        Ok(frames)
    }
}
