//! Batched precision conversion between f32 and f16.
//!
//! Pixel data crosses the tensor boundary in whatever element type the graph
//! was exported with, so these conversions sit on the hot path of every
//! reduced-precision model. The loops process a fixed batch width so the
//! compiler can vectorize them, and route the `len % batch` tail through a
//! zero-padded scratch batch, which keeps the numeric result identical for
//! any input length.

use half::f16;

/// Batch width for the f32 -> f16 direction.
const NARROW_BATCH: usize = 16;
/// Batch width for the f16 -> f32 direction.
const WIDEN_BATCH: usize = 32;

/// Converts `src` to half precision into `dst`.
///
/// Rounding is IEEE round-to-nearest-even via [`f16::from_f32`]. `src` and
/// `dst` must have equal lengths; the conversion itself has no error
/// conditions and no side effects beyond writing `dst`.
pub fn f32_to_f16(src: &[f32], dst: &mut [f16]) {
    debug_assert_eq!(src.len(), dst.len());
    let whole = src.len() - src.len() % NARROW_BATCH;
    for start in (0..whole).step_by(NARROW_BATCH) {
        for offset in 0..NARROW_BATCH {
            dst[start + offset] = f16::from_f32(src[start + offset]);
        }
    }
    let remaining = src.len() - whole;
    if remaining > 0 {
        let mut scratch_in = [0.0f32; NARROW_BATCH];
        let mut scratch_out = [f16::ZERO; NARROW_BATCH];
        scratch_in[..remaining].copy_from_slice(&src[whole..]);
        for offset in 0..NARROW_BATCH {
            scratch_out[offset] = f16::from_f32(scratch_in[offset]);
        }
        dst[whole..].copy_from_slice(&scratch_out[..remaining]);
    }
}

/// Converts `src` back to single precision into `dst`.
///
/// Widening is exact: every f16 value is representable as f32. `src` and
/// `dst` must have equal lengths.
pub fn f16_to_f32(src: &[f16], dst: &mut [f32]) {
    debug_assert_eq!(src.len(), dst.len());
    let whole = src.len() - src.len() % WIDEN_BATCH;
    for start in (0..whole).step_by(WIDEN_BATCH) {
        for offset in 0..WIDEN_BATCH {
            dst[start + offset] = src[start + offset].to_f32();
        }
    }
    let remaining = src.len() - whole;
    if remaining > 0 {
        let mut scratch_in = [f16::ZERO; WIDEN_BATCH];
        let mut scratch_out = [0.0f32; WIDEN_BATCH];
        scratch_in[..remaining].copy_from_slice(&src[whole..]);
        for offset in 0..WIDEN_BATCH {
            scratch_out[offset] = scratch_in[offset].to_f32();
        }
        dst[whole..].copy_from_slice(&scratch_out[..remaining]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(values: &[f32]) -> Vec<f32> {
        let mut halves = vec![f16::ZERO; values.len()];
        f32_to_f16(values, &mut halves);
        let mut restored = vec![0.0f32; values.len()];
        f16_to_f32(&halves, &mut restored);
        restored
    }

    #[test]
    fn round_trip_within_half_precision() {
        // 37 elements: exercises both tail paths (37 % 16 and 37 % 32).
        let values: Vec<f32> = (0..37).map(|i| (i as f32) * 0.37 - 5.0).collect();
        let restored = round_trip(&values);
        for (orig, back) in values.iter().zip(&restored) {
            let direct = f16::from_f32(*orig).to_f32();
            assert_eq!(*back, direct, "value {orig} drifted beyond a single cast");
        }
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let restored = round_trip(&[]);
        assert!(restored.is_empty());
    }

    #[test]
    fn tail_matches_batched_body() {
        // The same values must convert identically whether they land in the
        // batched body or in the scratch tail.
        let values: Vec<f32> = (0..48).map(|i| 1.0 / (i as f32 + 1.0)).collect();
        let full = round_trip(&values);
        let head = round_trip(&values[..19]);
        assert_eq!(&full[..19], &head[..]);
    }

    #[test]
    fn exact_batch_multiple() {
        let values: Vec<f32> = (0..64).map(|i| i as f32 * 3.25).collect();
        let restored = round_trip(&values);
        assert_eq!(restored, values);
    }
}
