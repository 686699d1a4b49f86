//! File loading helpers for models, dictionaries and images.

use crate::core::errors::{VisionError, VisionResult};
use image::RgbImage;
use std::path::Path;

/// Reads a serialized model graph into memory.
pub fn read_model_bytes(path: &Path) -> VisionResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| VisionError::io(path, e))
}

/// Reads a newline-delimited character dictionary.
///
/// Line `i` holds the character for recognition class index `i + 1`;
/// class 0 is the blank. Empty lines are preserved so indices stay aligned.
pub fn read_character_dict(path: &Path) -> VisionResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| VisionError::io(path, e))?;
    Ok(content.lines().map(|line| line.to_string()).collect())
}

/// Loads an image from disk and converts it to RGB.
pub fn load_image(path: &Path) -> VisionResult<RgbImage> {
    let img = image::open(path)?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_is_io_error() {
        let err = read_model_bytes(Path::new("no/such/model.onnx")).unwrap_err();
        assert!(matches!(err, VisionError::Io { .. }));
    }

    #[test]
    fn dictionary_preserves_line_order() {
        let dir = std::env::temp_dir().join("vision-serve-dict-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("keys.txt");
        std::fs::write(&path, "a\nb\n\nz\n").unwrap();

        let dict = read_character_dict(&path).unwrap();
        assert_eq!(dict, vec!["a", "b", "", "z"]);

        std::fs::remove_file(&path).ok();
    }
}
