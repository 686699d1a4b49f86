//! Model configuration loaded from YAML.
//!
//! The configuration is a read-only snapshot listing every servable model:
//! detector entries carry a single graph file, text pipeline entries carry a
//! detection graph, a recognition graph and a character dictionary. Entries
//! are looked up by name when a request triggers a lazy load.

use crate::core::errors::{VisionError, VisionResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A configured object detection model.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorModelInfo {
    /// Logical name used by requests to select this model.
    pub name: String,
    /// Version tag; parsed into [`crate::models::yolo::YoloVersion`] at load.
    pub version: String,
    /// Path to the serialized graph.
    pub path: PathBuf,
}

/// A configured text recognition pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrModelInfo {
    /// Logical name used by requests to select this model.
    pub name: String,
    /// Version tag; parsed into [`crate::models::ocr::OcrVersion`] at load.
    pub version: String,
    /// Path to the serialized text detection graph.
    pub det_path: PathBuf,
    /// Path to the serialized text recognition graph.
    pub rec_path: PathBuf,
    /// Path to the newline-delimited character dictionary.
    pub char_dict_path: PathBuf,
}

/// The model list consumed by the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Detector model entries.
    #[serde(default)]
    pub detector: Vec<DetectorModelInfo>,
    /// Text pipeline entries.
    #[serde(default)]
    pub ocr: Vec<OcrModelInfo>,
}

impl ModelConfig {
    /// Parses a configuration from YAML text.
    ///
    /// Deserialization failures are engine-external runtime errors and keep
    /// the underlying message.
    pub fn from_yaml_str(text: &str) -> VisionResult<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            VisionError::runtime(format!("unable to deserialize model config: {e}"))
        })
    }

    /// Reads and parses a configuration file.
    pub fn from_yaml_file(path: &Path) -> VisionResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| VisionError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Looks up a detector entry by name.
    pub fn find_detector(&self, name: &str) -> Option<&DetectorModelInfo> {
        self.detector.iter().find(|info| info.name == name)
    }

    /// Looks up a text pipeline entry by name.
    pub fn find_ocr(&self, name: &str) -> Option<&OcrModelInfo> {
        self.ocr.iter().find(|info| info.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
detector:
  - name: hd2-yolo11n
    version: v11
    path: models/hd2-yolo11n-fp16.onnx
  - name: gate-yolo10s
    version: v10
    path: models/gate-yolo10s.onnx
ocr:
  - name: ppocr-zh
    version: ppocr-v4
    det_path: models/ppocr-det.onnx
    rec_path: models/ppocr-rec.onnx
    char_dict_path: models/ppocr_keys_v1.txt
"#;

    #[test]
    fn parses_model_list() {
        let config = ModelConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.detector.len(), 2);
        assert_eq!(config.ocr.len(), 1);
        assert_eq!(config.detector[0].version, "v11");
        assert_eq!(
            config.ocr[0].char_dict_path,
            PathBuf::from("models/ppocr_keys_v1.txt")
        );
    }

    #[test]
    fn lookup_by_name() {
        let config = ModelConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.find_detector("gate-yolo10s").is_some());
        assert!(config.find_detector("ppocr-zh").is_none());
        assert!(config.find_ocr("ppocr-zh").is_some());
    }

    #[test]
    fn empty_sections_default() {
        let config = ModelConfig::from_yaml_str("detector: []").unwrap();
        assert!(config.detector.is_empty());
        assert!(config.ocr.is_empty());
    }

    #[test]
    fn malformed_yaml_is_runtime_error() {
        let err = ModelConfig::from_yaml_str("detector: {broken").unwrap_err();
        assert!(matches!(err, VisionError::Runtime { .. }));
    }
}
