//! Payload masking (RFC 6455 section 5.3).
//!
//! Masking is an XOR with a 4-byte key repeated over the payload, so applying
//! the same key twice restores the original bytes.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask_bytewise(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// XOR masking that processes eight bytes per step.
///
/// The key is widened to a `u64` once and applied to aligned-size chunks;
/// the tail falls back to the byte loop. The result is identical to
/// [`apply_mask_bytewise`] because every chunk starts at a multiple of four.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let wide = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ wide;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    apply_mask_bytewise(chunks.into_remainder(), mask);
}

/// Produces a fresh masking key for every outgoing frame.
///
/// Seeded from the operating system's random source, then advanced with a
/// mixing function so that generating a key never fails or blocks.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    state: u32,
}

impl MaskGenerator {
    /// Create a generator seeded from `getrandom`, falling back to the clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: random_seed(),
        }
    }

    /// Create a generator with a fixed seed.
    #[must_use]
    pub const fn with_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next masking key.
    pub fn next_mask(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        if getrandom::getrandom(&mut key).is_ok() {
            return key;
        }

        self.state = self.state.wrapping_add(0x9E37_79B9);
        let mut x = self.state;
        x = (x ^ (x >> 16)).wrapping_mul(0x85EB_CA6B);
        x = (x ^ (x >> 13)).wrapping_mul(0xC2B2_AE35);
        (x ^ (x >> 16)).to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        return u32::from_le_bytes(buf);
    }

    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0x1234_5678)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mut data: Vec<u8> = vec![];
        apply_mask(&mut data, [0x12, 0x34, 0x56, 0x78]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_aligned() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut data = vec![0x00; 8];
        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_wide_matches_bytewise() {
        let mask = [0xab, 0xcd, 0xef, 0x12];
        for len in [0, 1, 3, 4, 7, 8, 9, 15, 16, 17, 63, 64, 65, 1000] {
            let original: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let mut wide = original.clone();
            let mut narrow = original.clone();
            apply_mask(&mut wide, mask);
            apply_mask_bytewise(&mut narrow, mask);
            assert_eq!(wide, narrow, "length {len}");
        }
    }

    #[test]
    fn test_mask_generator_varies() {
        let mut generator = MaskGenerator::with_seed(7);
        let first = generator.next_mask();
        let differs = (0..16).any(|_| generator.next_mask() != first);
        assert!(differs);
    }
}
