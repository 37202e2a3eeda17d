//! FNV-1a hashing of byte strings.
//!
//! Used by the feature-hashing text encoder to map tokens to embedding slots.

const FNV_OFFSET_64: u64 = 0xcbf29ce484222325;
const FNV_PRIME_64: u64 = 0x100000001b3;

/// FNV-1a 64-bit hash of a byte string.
#[inline]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_64;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME_64);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vectors() {
        // Published FNV-1a test vectors.
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_fnv1a_distinguishes_tokens() {
        assert_ne!(fnv1a_64(b"chair"), fnv1a_64(b"chairs"));
        assert_eq!(fnv1a_64(b"hamburger"), fnv1a_64(b"hamburger"));
    }
}
