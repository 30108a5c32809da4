//! Payload obfuscation using a repeating-key XOR mask.
//!
//! This deters casual inspection of archive contents only. It is not
//! encryption: anyone holding the archive can recover the key from known
//! plaintext.

use std::fmt;

/// Key substituted when a caller supplies an empty one.
///
/// Archives written with the default key can be read by any build.
const FALLBACK_KEY: &[u8] = b"PAK0-strongbox-default-mask";

/// The key owned by a reader or writer instance.
///
/// Never empty. `Debug` output does not reveal the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Create a key, falling back to the built-in key when `key` is empty.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        if key.is_empty() {
            Self(FALLBACK_KEY.to_vec())
        } else {
            Self(key)
        }
    }

    /// Key length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the key has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if this is the built-in fallback key.
    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_KEY
    }

    /// Apply the mask to `buffer` in place.
    #[inline]
    pub fn apply(&self, buffer: &mut [u8]) {
        transform(buffer, &self.0);
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.0.len())
            .field("fallback", &self.is_fallback())
            .finish()
    }
}

/// XOR byte `i` of `buffer` with byte `i % key.len()` of `key`, in place.
///
/// Applying it twice with the same key restores the input. An empty key
/// leaves the buffer untouched.
pub fn transform(buffer: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }

    for (byte, k) in buffer.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}
