//! Inference engines served by the model cache.
//!
//! * `yolo` - object detection: preprocess, execute, decode, suppress
//! * `ocr` - two-stage text pipeline: detect regions, recognize text

pub mod ocr;
pub mod yolo;

pub use ocr::{OcrEngine, OcrFrame, OcrLine, OcrVersion};
pub use yolo::{Detection, DetectionFrame, YoloEngine, YoloVersion};

use crate::core::errors::{VisionError, VisionResult};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;

/// Name, element type and shape of a session's primary input tensor.
pub(crate) fn primary_input(
    session: &Session,
) -> VisionResult<(String, TensorElementType, Vec<i64>)> {
    let input = session
        .inputs
        .first()
        .ok_or_else(|| VisionError::model("model declares no inputs"))?;
    match &input.input_type {
        ValueType::Tensor { ty, shape, .. } => {
            Ok((input.name.clone(), *ty, shape.iter().copied().collect()))
        }
        other => Err(VisionError::model(format!(
            "model input is not a tensor: {other:?}"
        ))),
    }
}

/// Name and element type of a session's primary output tensor.
pub(crate) fn primary_output(session: &Session) -> VisionResult<(String, TensorElementType)> {
    let output = session
        .outputs
        .first()
        .ok_or_else(|| VisionError::model("model declares no outputs"))?;
    match &output.output_type {
        ValueType::Tensor { ty, .. } => Ok((output.name.clone(), *ty)),
        other => Err(VisionError::model(format!(
            "model output is not a tensor: {other:?}"
        ))),
    }
}

/// Accepts the two floating-point element types the detectors marshal.
pub(crate) fn ensure_float_type(role: &str, ty: TensorElementType) -> VisionResult<()> {
    match ty {
        TensorElementType::Float32 | TensorElementType::Float16 => Ok(()),
        other => Err(VisionError::parameter(format!(
            "unsupported {role} value type: {other:?}"
        ))),
    }
}

/// Accepts only single-precision tensors (the text pipeline's contract).
pub(crate) fn ensure_f32_type(role: &str, ty: TensorElementType) -> VisionResult<()> {
    match ty {
        TensorElementType::Float32 => Ok(()),
        other => Err(VisionError::parameter(format!(
            "unsupported {role} value type: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_types_are_accepted_for_detectors() {
        assert!(ensure_float_type("input", TensorElementType::Float32).is_ok());
        assert!(ensure_float_type("input", TensorElementType::Float16).is_ok());
        assert!(matches!(
            ensure_float_type("output", TensorElementType::Int64),
            Err(VisionError::Parameter { .. })
        ));
    }

    #[test]
    fn text_pipeline_requires_single_precision() {
        assert!(ensure_f32_type("input", TensorElementType::Float32).is_ok());
        assert!(matches!(
            ensure_f32_type("input", TensorElementType::Float16),
            Err(VisionError::Parameter { .. })
        ));
    }
}
