use super::{l2_normalize, EmbeddingModel};
use crate::pipeline::normalize::NormalizedSymptoms;
use crate::pipeline::DiagnosticError;

/// Folds per-descriptor embeddings into one unit-norm query vector.
pub struct ConstellationEncoder;

impl ConstellationEncoder {
    /// Weighted element-wise mean of the descriptor embeddings, re-normalized.
    ///
    /// One `embed_batch` call covers every descriptor. Any provider failure,
    /// including a short or mis-sized batch, is `EmbeddingUnavailable`.
    pub fn encode<E: EmbeddingModel + ?Sized>(
        embedder: &E,
        symptoms: &NormalizedSymptoms,
    ) -> Result<Vec<f32>, DiagnosticError> {
        if symptoms.is_empty() {
            return Err(DiagnosticError::EmptyConstellation);
        }

        let texts: Vec<&str> = symptoms.descriptors().iter().map(String::as_str).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(DiagnosticError::EmbeddingUnavailable(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let dim = embedder.dimension();
        let mut sum = vec![0.0f64; dim];
        for (vector, weight) in vectors.iter().zip(symptoms.weights()) {
            if vector.len() != dim {
                return Err(DiagnosticError::EmbeddingUnavailable(format!(
                    "Expected dimension {dim}, got {}",
                    vector.len()
                )));
            }
            for (acc, x) in sum.iter_mut().zip(vector) {
                *acc += f64::from(*x) * weight;
            }
        }

        let n = vectors.len() as f64;
        let mut constellation: Vec<f32> = sum.into_iter().map(|x| (x / n) as f32).collect();
        if !l2_normalize(&mut constellation) {
            return Err(DiagnosticError::EmptyConstellation);
        }

        tracing::debug!(descriptors = texts.len(), dim, "Constellation encoded");
        Ok(constellation)
    }
}
