//! Text encoders.

use dream_core::fnv1a_64;

/// Turns a prompt into a fixed-width embedding.
pub trait TextEncoder: Send + Sync {
    /// Embedding width.
    fn dim(&self) -> usize;

    /// Embed one prompt.
    fn encode(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing bag-of-words encoder.
///
/// Lowercased alphanumeric tokens are hashed with FNV-1a into `dim` slots
/// with a hash-derived sign, and the result is L2-normalized. The empty
/// prompt maps to the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct HashingTextEncoder {
    dim: usize,
}

impl HashingTextEncoder {
    /// Create an encoder with `dim` slots (at least one).
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashingTextEncoder {
    fn default() -> Self {
        Self::new(512)
    }
}

impl TextEncoder for HashingTextEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a_64(token.as_bytes());
            let slot = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            embedding[slot] += sign;
        }

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|v| *v /= norm);
        }
        embedding
    }
}
