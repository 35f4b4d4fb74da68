use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingError, EmbeddingModel};

/// Offline embedder producing hash-derived unit vectors.
///
/// Identical text always yields the identical vector; distinct texts are close
/// to orthogonal. No semantic signal, so only useful for tests and dry runs.
#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    dimension: usize,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingModel for DeterministicEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts
            .iter()
            .map(|t| deterministic_vector(t, self.dimension))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn deterministic_vector(text: &str, dim: usize) -> Result<Vec<f32>, EmbeddingError> {
    let mut vec = Vec::with_capacity(dim);
    let mut block: u32 = 0;

    while vec.len() < dim {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks_exact(4) {
            if vec.len() == dim {
                break;
            }
            let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            vec.push((f64::from(raw) / f64::from(u32::MAX) * 2.0 - 1.0) as f32);
        }
        block += 1;
    }

    if !l2_normalize(&mut vec) {
        return Err(EmbeddingError::ZeroVector);
    }
    Ok(vec)
}
