//! Vectorized batch comparison for 32-bit values
//!
//! Buffers are viewed as consecutive 4-byte lanes starting at offset 0. Every
//! function here agrees exactly with running [`matcher::matches`] over
//! `buffer.chunks_exact(4)`; trailing bytes that do not fill a lane are
//! ignored. On x86_64 the work is done 16 bytes at a time with SSE2, which is
//! part of the baseline target so no runtime detection is needed. Buffers
//! shorter than 16 bytes and the tail past the last full block use the scalar
//! path.
//!
//! [`matcher::matches`]: crate::memory::matcher::matches

#[cfg(target_arch = "x86_64")]
use crate::memory::matcher::{f32_matches, FLOAT_EPSILON};

/// Bytes compared per SIMD step
pub const LANE_BYTES: usize = 16;
const LANE_WIDTH: usize = 4;

/// Scalar reference implementations
pub mod scalar {
    use super::LANE_WIDTH;
    use crate::memory::matcher::f32_matches;

    #[inline]
    fn lanes(buffer: &[u8]) -> impl Iterator<Item = (usize, [u8; 4])> + '_ {
        buffer
            .chunks_exact(LANE_WIDTH)
            .enumerate()
            .map(|(i, c)| (i * LANE_WIDTH, [c[0], c[1], c[2], c[3]]))
    }

    pub fn any_match_i32(buffer: &[u8], target: i32) -> bool {
        lanes(buffer).any(|(_, b)| i32::from_le_bytes(b) == target)
    }

    pub fn any_match_f32(buffer: &[u8], target: f32) -> bool {
        lanes(buffer).any(|(_, b)| f32_matches(f32::from_le_bytes(b), target))
    }

    pub fn match_offsets_i32(buffer: &[u8], target: i32, out: &mut Vec<usize>) {
        out.extend(
            lanes(buffer)
                .filter(|(_, b)| i32::from_le_bytes(*b) == target)
                .map(|(offset, _)| offset),
        );
    }

    pub fn match_offsets_f32(buffer: &[u8], target: f32, out: &mut Vec<usize>) {
        out.extend(
            lanes(buffer)
                .filter(|(_, b)| f32_matches(f32::from_le_bytes(*b), target))
                .map(|(offset, _)| offset),
        );
    }
}

#[cfg(target_arch = "x86_64")]
mod sse2 {
    use super::{LANE_BYTES, FLOAT_EPSILON};
    use std::arch::x86_64::*;

    /// One bit per 4-byte lane equal to `target`
    #[inline]
    pub fn mask_i32(block: &[u8], target: i32) -> u32 {
        assert!(block.len() >= LANE_BYTES);
        // SAFETY: SSE2 is always available on x86_64 and the load is unaligned
        // over 16 bytes that the assertion above guarantees exist.
        unsafe {
            let data = _mm_loadu_si128(block.as_ptr() as *const __m128i);
            let cmp = _mm_cmpeq_epi32(data, _mm_set1_epi32(target));
            _mm_movemask_ps(_mm_castsi128_ps(cmp)) as u32
        }
    }

    /// One bit per lane within epsilon of `target`.
    ///
    /// NaN lanes compare false; callers still re-check flagged lanes for
    /// finiteness.
    #[inline]
    pub fn mask_f32(block: &[u8], target: f32) -> u32 {
        assert!(block.len() >= LANE_BYTES);
        // SAFETY: as in `mask_i32`.
        unsafe {
            let data = _mm_loadu_ps(block.as_ptr() as *const f32);
            let diff = _mm_sub_ps(data, _mm_set1_ps(target));
            let sign = _mm_castsi128_ps(_mm_set1_epi32(i32::MIN));
            let abs = _mm_andnot_ps(sign, diff);
            let cmp = _mm_cmplt_ps(abs, _mm_set1_ps(FLOAT_EPSILON as f32));
            _mm_movemask_ps(cmp) as u32
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn lane_f32(buffer: &[u8], offset: usize) -> f32 {
    let mut bytes = [0u8; LANE_WIDTH];
    bytes.copy_from_slice(&buffer[offset..offset + LANE_WIDTH]);
    f32::from_le_bytes(bytes)
}

/// Whether any 4-byte lane of `buffer` equals `target`
#[cfg(target_arch = "x86_64")]
pub fn any_match_i32(buffer: &[u8], target: i32) -> bool {
    if buffer.len() < LANE_BYTES {
        return scalar::any_match_i32(buffer, target);
    }
    let simd_len = buffer.len() - buffer.len() % LANE_BYTES;
    buffer[..simd_len]
        .chunks_exact(LANE_BYTES)
        .any(|block| sse2::mask_i32(block, target) != 0)
        || scalar::any_match_i32(&buffer[simd_len..], target)
}

/// Whether any 4-byte lane of `buffer` is a finite float within epsilon of `target`
#[cfg(target_arch = "x86_64")]
pub fn any_match_f32(buffer: &[u8], target: f32) -> bool {
    if buffer.len() < LANE_BYTES {
        return scalar::any_match_f32(buffer, target);
    }
    let simd_len = buffer.len() - buffer.len() % LANE_BYTES;
    for (i, block) in buffer[..simd_len].chunks_exact(LANE_BYTES).enumerate() {
        let mask = sse2::mask_f32(block, target);
        if mask != 0 && confirmed_f32(buffer, i * LANE_BYTES, mask, target).next().is_some() {
            return true;
        }
    }
    scalar::any_match_f32(&buffer[simd_len..], target)
}

/// Appends the offset of every lane equal to `target`, in ascending order
#[cfg(target_arch = "x86_64")]
pub fn match_offsets_i32(buffer: &[u8], target: i32, out: &mut Vec<usize>) {
    if buffer.len() < LANE_BYTES {
        return scalar::match_offsets_i32(buffer, target, out);
    }
    let simd_len = buffer.len() - buffer.len() % LANE_BYTES;
    for (i, block) in buffer[..simd_len].chunks_exact(LANE_BYTES).enumerate() {
        let mask = sse2::mask_i32(block, target);
        if mask != 0 {
            out.extend(set_lanes(mask).map(|lane| i * LANE_BYTES + lane * LANE_WIDTH));
        }
    }
    let tail_start = out.len();
    scalar::match_offsets_i32(&buffer[simd_len..], target, out);
    for offset in &mut out[tail_start..] {
        *offset += simd_len;
    }
}

/// Appends the offset of every lane matching `target` as a float, in ascending order
#[cfg(target_arch = "x86_64")]
pub fn match_offsets_f32(buffer: &[u8], target: f32, out: &mut Vec<usize>) {
    if buffer.len() < LANE_BYTES {
        return scalar::match_offsets_f32(buffer, target, out);
    }
    let simd_len = buffer.len() - buffer.len() % LANE_BYTES;
    for (i, block) in buffer[..simd_len].chunks_exact(LANE_BYTES).enumerate() {
        let mask = sse2::mask_f32(block, target);
        if mask != 0 {
            out.extend(confirmed_f32(buffer, i * LANE_BYTES, mask, target));
        }
    }
    let tail_start = out.len();
    scalar::match_offsets_f32(&buffer[simd_len..], target, out);
    for offset in &mut out[tail_start..] {
        *offset += simd_len;
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub use scalar::{any_match_f32, any_match_i32, match_offsets_f32, match_offsets_i32};

#[cfg(target_arch = "x86_64")]
#[inline]
fn set_lanes(mask: u32) -> impl Iterator<Item = usize> {
    (0..LANE_BYTES / LANE_WIDTH).filter(move |lane| mask & (1 << lane) != 0)
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn confirmed_f32(
    buffer: &[u8],
    block_start: usize,
    mask: u32,
    target: f32,
) -> impl Iterator<Item = usize> + '_ {
    set_lanes(mask)
        .map(move |lane| block_start + lane * LANE_WIDTH)
        .filter(move |&offset| f32_matches(lane_f32(buffer, offset), target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_small_buffers_use_scalar() {
        let buf = buffer_with(&[1, 2, 3]);
        assert!(any_match_i32(&buf, 3));
        assert!(!any_match_i32(&buf, 4));
        assert!(!any_match_i32(&[], 0));
    }

    #[test]
    fn test_offsets_across_blocks_and_tail() {
        let buf = buffer_with(&[7, 0, 0, 7, 0, 0, 0, 0, 0, 7]);
        let mut offsets = Vec::new();
        match_offsets_i32(&buf, 7, &mut offsets);
        assert_eq!(offsets, vec![0, 12, 36]);
    }

    #[test]
    fn test_unfilled_tail_ignored() {
        let mut buf = buffer_with(&[0, 0, 0, 0]);
        buf.extend_from_slice(&[9, 0, 0]);
        assert!(!any_match_i32(&buf, 9));
    }

    #[test]
    fn test_float_lanes() {
        let mut buf = Vec::new();
        for v in [1.0f32, f32::NAN, 2.00001, f32::INFINITY, 0.0, 2.0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        assert!(any_match_f32(&buf, 2.0));
        let mut offsets = Vec::new();
        match_offsets_f32(&buf, 2.0, &mut offsets);
        assert_eq!(offsets, vec![8, 20]);
        assert!(!any_match_f32(&buf, 3.0));
    }

    #[test]
    fn test_agrees_with_scalar() {
        let buf: Vec<u8> = (0..203u32).map(|i| (i * 37 % 251) as u8).collect();
        for target in [0, 1, 0x2F, -1, i32::from_le_bytes([buf[40], buf[41], buf[42], buf[43]])] {
            let mut simd = Vec::new();
            let mut reference = Vec::new();
            match_offsets_i32(&buf, target, &mut simd);
            scalar::match_offsets_i32(&buf, target, &mut reference);
            assert_eq!(simd, reference);
            assert_eq!(any_match_i32(&buf, target), scalar::any_match_i32(&buf, target));
        }
    }
}
