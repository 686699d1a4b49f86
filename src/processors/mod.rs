//! Numeric and image processing utilities around the tensor boundary.
//!
//! # Modules
//!
//! * `convert` - batched f32/f16 precision conversion
//! * `geometry` - rectangles, IOU, non-max suppression, IOU deduplication
//! * `letterbox` - aspect-preserving resize and the inverse box transform
//! * `normalization` - channel reordering and per-channel normalization

pub mod convert;
pub mod geometry;
pub mod letterbox;
pub mod normalization;

pub use convert::{f16_to_f32, f32_to_f16};
pub use geometry::{Rect, filter_by_iou, nms_indices};
pub use letterbox::{LetterboxMeta, letterbox, pad_to_multiple};
pub use normalization::{ChannelLayout, Normalizer, interleaved_to_planar};
