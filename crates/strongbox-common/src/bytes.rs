//! Byte scanning helpers.
//!
//! Thin wrappers over `memchr`, which already picks the best SIMD
//! implementation for the host (AVX2, SSE2, NEON) at runtime.

/// Find the first null byte in a slice, returning its index.
#[inline]
pub fn find_null(data: &[u8]) -> Option<usize> {
    memchr::memchr(0, data)
}

/// Find the first byte of `data` that is any of the three needles.
#[inline]
pub fn find_any3(a: u8, b: u8, c: u8, data: &[u8]) -> Option<usize> {
    memchr::memchr3(a, b, c, data)
}

/// Find a multi-byte pattern in a slice.
#[inline]
pub fn find_pattern(needle: &[u8], haystack: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}
