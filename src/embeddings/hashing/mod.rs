
use anyhow::{Result, bail};
use tracing::debug;

use super::Embedder;

pub const DEFAULT_HASHING_DIMENSION: u32 = 384;

/// Bumped whenever the token hashing scheme changes
const HASHING_SCHEME_VERSION: u32 = 1;

/// Offline embedder based on the hashing trick.
///
/// Each lowercased alphanumeric token is hashed with BLAKE3; the first eight
/// bytes pick a bucket and the ninth byte picks the sign. The resulting term
/// vector is L2-normalised, so texts sharing vocabulary land close together
/// under cosine distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            bail!("Hashing embedder dimension must be greater than zero");
        }
        Ok(Self { dimension })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();

        let mut prefix = [0_u8; 8];
        prefix.copy_from_slice(&bytes[..8]);
        let dimension = self.dimension as u64;
        // Remainder is below `dimension`, which came from a usize
        let index = (u64::from_le_bytes(prefix) % dimension) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

        (index, sign)
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        Ok(vector)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Hashing {} texts into {} dimensions", texts.len(), self.dimension);
        texts.iter().map(|text| self.embed(text)).collect()
    }

    #[inline]
    fn model_id(&self) -> String {
        format!("hashing-blake3-v{}/{}", HASHING_SCHEME_VERSION, self.dimension)
    }
}

/// Lowercased runs of alphanumeric characters
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}
