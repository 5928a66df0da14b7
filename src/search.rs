/*!
Single-byte search within one contiguous span.

Where the target has 128-bit vectors (SSE2 on x86_64, NEON on aarch64),
the span is compared against a broadcast of the needle one vector at a time.
A vector with no matching lane is skipped as a whole; otherwise the exact
byte is decoded from the comparison mask by [`first_set_lane`].
Tails shorter than a vector are scanned byte by byte.
Other targets go through `memchr`.
*/

/// Width of the vectors used by the accelerated path, in bytes.
pub const VECTOR_WIDTH: usize = 16;

/// Lane mask as produced by a vector equality test: matching bytes are non-zero.
/// Byte `i` of the vector lives in `lanes[i / 8]`, bits `8 * (i % 8)` and up.
pub type LaneMask = [u64; VECTOR_WIDTH / 8];

/// Whether this build searches with hardware vectors.
pub fn has_vector_support() -> bool {
	imp::VECTORIZED
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
	imp::find_byte(needle, haystack)
}

/**
Offset of the first non-zero byte of a lane mask.

The first non-zero 64-bit lane is found by a linear scan,
then the byte within that lane is narrowed down by halves.
*/
pub fn first_set_lane(mask: &LaneMask) -> Option<usize> {
	for (i, &lane) in mask.iter().enumerate() {
		if lane != 0 {
			return Some(i * 8 + first_set_byte(lane));
		}
	}
	None
}

// `lane` must not be zero
#[inline]
fn first_set_byte(lane: u64) -> usize {
	let mut lane = lane;
	let mut offset = 0;
	if lane as u32 == 0 {
		offset += 4;
		lane >>= 32;
	}
	if lane as u16 == 0 {
		offset += 2;
		lane >>= 16;
	}
	if lane as u8 == 0 {
		offset += 1;
	}
	offset
}

#[inline]
#[allow(dead_code)]
fn mask_from_bytes(bytes: [u8; VECTOR_WIDTH]) -> LaneMask {
	let mut lo = [0; 8];
	let mut hi = [0; 8];
	lo.copy_from_slice(&bytes[..8]);
	hi.copy_from_slice(&bytes[8..]);
	[u64::from_le_bytes(lo), u64::from_le_bytes(hi)]
}

#[inline]
#[allow(dead_code)]
fn scalar(needle: u8, haystack: &[u8]) -> Option<usize> {
	haystack.iter().position(|&b| b == needle)
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
mod imp {
	use super::*;
	use std::arch::x86_64::*;

	pub const VECTORIZED: bool = true;

	pub fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
		let mut offset = 0;
		// sse2 is guaranteed by the cfg above, loads are unaligned and stay within `haystack`
		unsafe {
			let pattern = _mm_set1_epi8(needle as i8);
			while haystack.len() - offset >= VECTOR_WIDTH {
				let chunk = _mm_loadu_si128(haystack.as_ptr().add(offset) as *const __m128i);
				let eq = _mm_cmpeq_epi8(chunk, pattern);
				let mut bytes = [0u8; VECTOR_WIDTH];
				_mm_storeu_si128(bytes.as_mut_ptr() as *mut __m128i, eq);
				if let Some(lane) = first_set_lane(&mask_from_bytes(bytes)) {
					return Some(offset + lane);
				}
				offset += VECTOR_WIDTH;
			}
		}
		scalar(needle, &haystack[offset..]).map(|i| offset + i)
	}
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
mod imp {
	use super::*;
	use std::arch::aarch64::*;

	pub const VECTORIZED: bool = true;

	pub fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
		let mut offset = 0;
		// neon is guaranteed by the cfg above, loads stay within `haystack`
		unsafe {
			let pattern = vdupq_n_u8(needle);
			while haystack.len() - offset >= VECTOR_WIDTH {
				let chunk = vld1q_u8(haystack.as_ptr().add(offset));
				let eq = vceqq_u8(chunk, pattern);
				let mut bytes = [0u8; VECTOR_WIDTH];
				vst1q_u8(bytes.as_mut_ptr(), eq);
				if let Some(lane) = first_set_lane(&mask_from_bytes(bytes)) {
					return Some(offset + lane);
				}
				offset += VECTOR_WIDTH;
			}
		}
		scalar(needle, &haystack[offset..]).map(|i| offset + i)
	}
}

#[cfg(not(any(
	all(target_arch = "x86_64", target_feature = "sse2"),
	all(target_arch = "aarch64", target_feature = "neon"),
)))]
mod imp {
	pub const VECTORIZED: bool = false;

	pub fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
		memchr::memchr(needle, haystack)
	}
}
