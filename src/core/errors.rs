//! Error types for the inference core.
//!
//! All public operations return [`VisionResult`]; the error kinds mirror the
//! failure taxonomy of the serving runtime: bad arguments, file I/O, model
//! lookup/construction, engine execution, and device selection. Backend
//! exceptions never cross the public boundary — they are converted here with
//! their original message preserved.

use std::path::Path;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors produced by the inference core.
#[derive(Error, Debug)]
pub enum VisionError {
    /// Bad or unsupported arguments: unknown version tags, unsupported
    /// provider combinations, empty images, unsupported tensor element types.
    #[error("invalid parameter: {message}")]
    Parameter {
        /// Description of the offending argument.
        message: String,
    },

    /// File read failure for model bytes, dictionaries or configuration.
    #[error("i/o failure: {message}")]
    Io {
        /// Description including the path involved.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Model-not-found, model construction failure, or missing required
    /// model metadata (such as class names).
    #[error("model error: {message}")]
    Model {
        /// Description of the model failure.
        message: String,
    },

    /// The underlying engine failed during session creation or execution.
    #[error("runtime error: {message}")]
    Runtime {
        /// The engine's original message.
        message: String,
    },

    /// Device-selection failure (provider compiled out, bad device id).
    #[error("device error: {message}")]
    Device {
        /// Description of the device failure.
        message: String,
    },

    /// Error occurred while decoding an image.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// Error from tensor shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),
}

impl VisionError {
    /// Creates a parameter error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Creates a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Creates a device error.
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Creates an I/O error carrying the path that failed.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            message: format!("unable to read {}", path.display()),
            source,
        }
    }
}

/// Engine errors are surfaced as runtime errors with the message preserved.
impl From<ort::Error> for VisionError {
    fn from(error: ort::Error) -> Self {
        Self::Runtime {
            message: error.to_string(),
        }
    }
}
